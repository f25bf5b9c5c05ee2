//! The agent interface and the LB agent wrapper.

use std::sync::Arc;

use tracing::error;

use muster_model::{BoxFuture, Call, CallModel, GroupResolver, StaticGroupResolver};
use muster_placer::{NaivePlacer, Placer};
use muster_pool::NodePool;

use crate::error::AgentError;
use crate::slot::RemoteSlot;

/// Observes call lifecycle events.
pub trait CallListener: Send + Sync {
    fn call_started(&self, model: &CallModel);
    fn call_ended(&self, model: &CallModel, success: bool);
}

/// The agent-facing surface the front end drives.
pub trait Agent: Send + Sync {
    /// Admit a call and attach its execution slot.
    fn get_call(&self, model: CallModel) -> Result<Call, AgentError>;

    /// Run an admitted call through its reserved slot, synchronously
    /// from the caller's point of view.
    fn submit<'a>(&'a self, call: &'a Call) -> BoxFuture<'a, Result<(), AgentError>>;

    /// Queue a call for asynchronous execution.
    fn enqueue<'a>(&'a self, model: &'a CallModel) -> BoxFuture<'a, Result<(), AgentError>>;

    fn add_call_listener(&self, listener: Arc<dyn CallListener>);

    /// Metrics surface, mountable on the admin server.
    fn metrics_router(&self) -> axum::Router;

    fn close<'a>(&'a self) -> BoxFuture<'a, Result<(), AgentError>>;
}

/// Agent that delegates local concerns and intercepts admission to
/// reserve a remote slot.
pub struct LbAgent<A: Agent> {
    delegate: A,
    pool: Arc<NodePool>,
    placer: Arc<dyn Placer>,
    resolver: Arc<dyn GroupResolver>,
}

impl<A: Agent> LbAgent<A> {
    pub fn new(delegate: A, pool: Arc<NodePool>) -> Self {
        Self {
            delegate,
            pool,
            placer: Arc::new(NaivePlacer::default()),
            resolver: Arc::new(StaticGroupResolver::default()),
        }
    }

    /// Override the placement strategy.
    pub fn with_placer(mut self, placer: Arc<dyn Placer>) -> Self {
        self.placer = placer;
        self
    }

    /// Override group derivation.
    pub fn with_group_resolver(mut self, resolver: Arc<dyn GroupResolver>) -> Self {
        self.resolver = resolver;
        self
    }
}

impl<A: Agent> Agent for LbAgent<A> {
    /// Delegates admission, then adds the remote slot reservation that
    /// implements the actual running functionality.
    fn get_call(&self, model: CallModel) -> Result<Call, AgentError> {
        let mut call = self.delegate.get_call(model)?;
        call.reserve_slot(Arc::new(RemoteSlot::new(
            Arc::clone(&self.pool),
            Arc::clone(&self.placer),
            Arc::clone(&self.resolver),
        )));
        Ok(call)
    }

    fn submit<'a>(&'a self, call: &'a Call) -> BoxFuture<'a, Result<(), AgentError>> {
        self.delegate.submit(call)
    }

    fn enqueue<'a>(&'a self, model: &'a CallModel) -> BoxFuture<'a, Result<(), AgentError>> {
        Box::pin(async move {
            error!(call_id = %model.id, "enqueue requested on the lb agent; rejecting");
            Err(AgentError::EnqueueUnsupported)
        })
    }

    fn add_call_listener(&self, listener: Arc<dyn CallListener>) {
        self.delegate.add_call_listener(listener);
    }

    fn metrics_router(&self) -> axum::Router {
        self.delegate.metrics_router()
    }

    fn close<'a>(&'a self) -> BoxFuture<'a, Result<(), AgentError>> {
        Box::pin(async move {
            self.pool.shutdown();
            self.delegate.close().await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::Instant;

    use muster_model::{CallId, LbGroupId};
    use muster_placer::PlacerConfig;
    use muster_pool::{Runner, RunnerError, TryExecOutcome};

    use crate::local::LocalAgent;

    struct FixedRunner {
        address: String,
        accept: bool,
        attempts: AtomicUsize,
    }

    impl FixedRunner {
        fn new(address: &str, accept: bool) -> Arc<Self> {
            Arc::new(Self {
                address: address.to_string(),
                accept,
                attempts: AtomicUsize::new(0),
            })
        }
    }

    impl Runner for FixedRunner {
        fn address(&self) -> &str {
            &self.address
        }

        fn try_exec<'a>(
            &'a self,
            _call: &'a Call,
        ) -> BoxFuture<'a, Result<TryExecOutcome, RunnerError>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let accept = self.accept;
            Box::pin(async move {
                if accept {
                    Ok(TryExecOutcome::Placed(Ok(())))
                } else {
                    Ok(TryExecOutcome::Rejected)
                }
            })
        }
    }

    fn model(id: &str) -> CallModel {
        CallModel {
            id: CallId::new(id),
            app_id: "app".to_string(),
            path: "/fn".to_string(),
            image: "img".to_string(),
            memory_mb: 128,
            timeout_secs: 5,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_rejecting_then_accepting_runner() {
        let group = LbGroupId::new("g1");
        let pool = Arc::new(NodePool::new());
        let a = FixedRunner::new("a:1", false);
        let b = FixedRunner::new("b:1", true);
        pool.insert_runner(&group, a.clone() as Arc<dyn Runner>);
        pool.insert_runner(&group, b.clone() as Arc<dyn Runner>);

        let agent = LbAgent::new(LocalAgent::new(), Arc::clone(&pool))
            .with_group_resolver(Arc::new(StaticGroupResolver::new("g1")));

        let started = Instant::now();
        let call = agent.get_call(model("c1")).unwrap();
        agent.submit(&call).await.unwrap();

        assert_eq!(a.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(b.attempts.load(Ordering::SeqCst), 1);
        // Never blocks past one retry interval.
        assert!(started.elapsed() <= Duration::from_millis(20));
        // Capacity claim fully released.
        assert_eq!(pool.committed_mb(&group), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn busy_path_still_releases_capacity() {
        let group = LbGroupId::new("g1");
        let pool = Arc::new(NodePool::new());

        let agent = LbAgent::new(LocalAgent::new(), Arc::clone(&pool))
            .with_group_resolver(Arc::new(StaticGroupResolver::new("g1")))
            .with_placer(Arc::new(NaivePlacer::new(PlacerConfig {
                no_capacity_wait: Duration::from_millis(20),
                ..PlacerConfig::default()
            })));

        let mut call = agent.get_call(model("c1")).unwrap();
        call = call.with_deadline(Instant::now() + Duration::from_millis(100));

        let err = agent.submit(&call).await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Exec(muster_model::ExecError::ServerBusy)
        ));
        assert_eq!(pool.committed_mb(&group), 0);
    }

    #[tokio::test]
    async fn enqueue_fails_loudly() {
        let pool = Arc::new(NodePool::new());
        let agent = LbAgent::new(LocalAgent::new(), pool);

        let err = agent.enqueue(&model("c1")).await.unwrap_err();
        assert!(matches!(err, AgentError::EnqueueUnsupported));
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_pass_through_to_the_delegate() {
        struct RecordingListener {
            events: Mutex<Vec<(String, bool)>>,
        }

        impl CallListener for RecordingListener {
            fn call_started(&self, model: &CallModel) {
                self.events
                    .lock()
                    .unwrap()
                    .push((format!("start:{}", model.id), true));
            }

            fn call_ended(&self, model: &CallModel, success: bool) {
                self.events
                    .lock()
                    .unwrap()
                    .push((format!("end:{}", model.id), success));
            }
        }

        let group = LbGroupId::new("g1");
        let pool = Arc::new(NodePool::new());
        pool.insert_runner(&group, FixedRunner::new("a:1", true) as Arc<dyn Runner>);

        let listener = Arc::new(RecordingListener {
            events: Mutex::new(Vec::new()),
        });
        let agent = LbAgent::new(LocalAgent::new(), pool)
            .with_group_resolver(Arc::new(StaticGroupResolver::new("g1")));
        agent.add_call_listener(listener.clone());

        let call = agent.get_call(model("c9")).unwrap();
        agent.submit(&call).await.unwrap();

        let events = listener.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                ("start:c9".to_string(), true),
                ("end:c9".to_string(), true)
            ]
        );
    }

    #[tokio::test]
    async fn close_shuts_the_pool_down() {
        let group = LbGroupId::new("g1");
        let pool = Arc::new(NodePool::new());
        pool.insert_runner(&group, FixedRunner::new("a:1", true) as Arc<dyn Runner>);

        let agent = LbAgent::new(LocalAgent::new(), Arc::clone(&pool));
        agent.close().await.unwrap();

        assert!(pool.is_shut_down());
        assert!(pool.runners(&group).is_empty());
    }
}
