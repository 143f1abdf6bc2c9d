//! Per-connection nREPL session state (§4.8): each TCP connection owns one
//! session, evaluated sequentially; independent sessions share the
//! [`corvid_runtime::RuntimeContext`] and run concurrently against it.

use corvid_compiler::NativeDeclRegistry;
use corvid_runtime::RuntimeContext;
use std::sync::Arc;
use uuid::Uuid;

pub struct Session {
    pub id: String,
    pub ctx: Arc<RuntimeContext>,
    pub native: Arc<NativeDeclRegistry>,
    current_ns: String,
    eval_seq: u64,
}

impl Session {
    pub fn new(ctx: Arc<RuntimeContext>, native: Arc<NativeDeclRegistry>) -> Self {
        ctx.intern_namespace("user");
        Session { id: Uuid::new_v4().to_string(), ctx, native, current_ns: "user".to_string(), eval_seq: 0 }
    }

    pub fn current_ns(&self) -> &str {
        &self.current_ns
    }

    pub fn set_current_ns(&mut self, ns: impl Into<String>) {
        self.current_ns = ns.into();
    }

    /// Each `eval`/`test` request gets its own JIT unit name: back-to-back
    /// requests in one session must not collide on the persistent on-disk
    /// cache's `{unit_name}-{hash}.so` naming (§8 "JIT processor").
    pub fn next_unit_name(&mut self) -> String {
        self.eval_seq += 1;
        format!("nrepl_{}_{}", sanitize(&self.id), self.eval_seq)
    }
}

fn sanitize(s: &str) -> String {
    s.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Session {
        let ctx = Arc::new(RuntimeContext::new(vec![], std::env::temp_dir()));
        Session::new(ctx, Arc::new(NativeDeclRegistry::new()))
    }

    #[test]
    fn new_session_starts_in_user_namespace() {
        let session = fresh();
        assert_eq!(session.current_ns(), "user");
    }

    #[test]
    fn unit_names_are_distinct_across_calls() {
        let mut session = fresh();
        let a = session.next_unit_name();
        let b = session.next_unit_name();
        assert_ne!(a, b);
    }
}
