use std::fmt::Debug;

use rustc_hash::FxHashMap;
use tracing::trace;

use super::Value;

type Frame = FxHashMap<String, Value>;

/// The scope chain: the global frame plus a stack of frames pushed by
/// function calls and nested blocks. Lookups walk every frame from the top
/// down, so a callee sees its caller's locals.
#[derive(Clone, Default)]
pub struct Environment {
    global: Frame,
    stack: Vec<Frame>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.stack.push(Frame::default());
        trace!(depth = self.depth(), "pushed frame");
    }

    /// Pops the top frame. The global frame is never popped.
    pub fn pop(&mut self) {
        if self.stack.pop().is_some() {
            trace!(depth = self.depth(), "popped frame");
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len() + 1
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.stack
            .iter()
            .rev()
            .chain(std::iter::once(&self.global))
            .find_map(|frame| frame.get(name))
    }

    /// Binds `name` in the top frame, shadowing any outer binding.
    pub fn assign(&mut self, name: String, value: Value) {
        self.current_mut().insert(name, value);
    }

    fn current_mut(&mut self) -> &mut Frame {
        match self.stack.last_mut() {
            Some(frame) => frame,
            None => &mut self.global,
        }
    }
}

impl Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entry(&self.global)
            .entries(self.stack.iter())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_falls_through_to_outer_frames() {
        let mut environment = Environment::new();
        environment.assign("a".to_string(), Value::Integer(1));
        environment.push();
        environment.assign("b".to_string(), Value::Integer(2));
        environment.push();

        assert_eq!(environment.get("a"), Some(&Value::Integer(1)));
        assert_eq!(environment.get("b"), Some(&Value::Integer(2)));
        assert_eq!(environment.get("c"), None);
        assert_eq!(environment.depth(), 3);
    }

    #[test]
    fn test_assign_shadows_instead_of_writing_through() {
        let mut environment = Environment::new();
        environment.assign("x".to_string(), Value::Integer(1));
        environment.push();
        environment.assign("x".to_string(), Value::Integer(2));
        assert_eq!(environment.get("x"), Some(&Value::Integer(2)));

        environment.pop();
        assert_eq!(environment.get("x"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_global_frame_survives_extra_pops() {
        let mut environment = Environment::new();
        environment.assign("x".to_string(), Value::Boolean(true));
        environment.pop();
        environment.pop();
        assert_eq!(environment.depth(), 1);
        assert_eq!(environment.get("x"), Some(&Value::Boolean(true)));
    }
}
