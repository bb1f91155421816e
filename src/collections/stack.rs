//! # TrackedStack - Pilha LIFO Instrumentada
//!
//! `push`, `pop` (lança "Stack underflow" vazia), `peek` e `clear`.
//! `peek` é uma das leituras documentadas que emitem passo. A carga via
//! factory com array inicial é silenciosa: o trace começa nas operações
//! do usuário.

use std::cell::RefCell;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult};
use serde_json::Value;

use super::{dynamic_to_value, meta, value_to_dynamic, StepRecorder};

const TARGET: &str = "stack";

/// Handle compartilhado de uma pilha rastreada (topo no final).
#[derive(Clone)]
pub struct TrackedStack {
    items: Rc<RefCell<Vec<Value>>>,
    recorder: Option<StepRecorder>,
}

impl TrackedStack {
    /// Cria uma pilha; a carga inicial não gera passos.
    pub fn new(initial: Vec<Value>, recorder: Option<StepRecorder>) -> Self {
        Self {
            items: Rc::new(RefCell::new(initial)),
            recorder,
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Snapshot base→topo. Não emite passo.
    pub fn snapshot(&self) -> Value {
        Value::Array(self.items.borrow().clone())
    }

    fn emit(&self, step_type: &str, args: Vec<Value>, metadata: serde_json::Map<String, Value>) {
        if let Some(recorder) = &self.recorder {
            recorder.capture(step_type, TARGET, args, self.snapshot(), metadata);
        }
    }

    pub fn push(&self, value: Value) {
        self.items.borrow_mut().push(value.clone());
        self.emit("push", vec![value.clone()], meta(vec![("value", value)]));
    }

    /// Remove e retorna o topo. Pilha vazia é erro.
    pub fn pop(&self) -> Result<Value, String> {
        let removed = self
            .items
            .borrow_mut()
            .pop()
            .ok_or_else(|| "Stack underflow".to_string())?;
        self.emit("pop", vec![], meta(vec![("value", removed.clone())]));
        Ok(removed)
    }

    /// Olha o topo sem remover. Emite passo (leitura documentada).
    pub fn peek(&self) -> Value {
        let top = self.items.borrow().last().cloned().unwrap_or(Value::Null);
        self.emit("peek", vec![], meta(vec![("value", top.clone())]));
        top
    }

    pub fn clear(&self) {
        self.items.borrow_mut().clear();
        self.emit("clear", vec![], meta(vec![]));
    }
}

// ============================================================================
// REGISTRO NO ENGINE
// ============================================================================

/// Registra o tipo, os métodos e os factories de TrackedStack.
pub fn register(engine: &mut Engine, recorder: &StepRecorder) {
    engine.register_type_with_name::<TrackedStack>("TrackedStack");

    engine.register_fn("push", |stack: &mut TrackedStack, value: Dynamic| {
        stack.push(dynamic_to_value(&value));
    });
    engine.register_fn(
        "pop",
        |stack: &mut TrackedStack| -> Result<Dynamic, Box<EvalAltResult>> {
            stack
                .pop()
                .map(|v| value_to_dynamic(&v))
                .map_err(Into::into)
        },
    );
    engine.register_fn("peek", |stack: &mut TrackedStack| {
        value_to_dynamic(&stack.peek())
    });
    engine.register_fn("clear", |stack: &mut TrackedStack| stack.clear());
    engine.register_fn("getSize", |stack: &mut TrackedStack| stack.len() as i64);
    engine.register_fn("len", |stack: &mut TrackedStack| stack.len() as i64);
    engine.register_fn("isEmpty", |stack: &mut TrackedStack| stack.is_empty());
    engine.register_get("length", |stack: &mut TrackedStack| stack.len() as i64);
    engine.register_fn("getData", |stack: &mut TrackedStack| {
        value_to_dynamic(&stack.snapshot())
    });
    engine.register_fn("toArray", |stack: &mut TrackedStack| {
        value_to_dynamic(&stack.snapshot())
    });

    let rec = recorder.clone();
    engine.register_fn("createTrackedStack", move || {
        TrackedStack::new(Vec::new(), Some(rec.clone()))
    });
    // Carga silenciosa a partir de array (preload não gera passos).
    let rec = recorder.clone();
    engine.register_fn("createTrackedStack", move |initial: Array| {
        let items: Vec<Value> = initial.iter().map(dynamic_to_value).collect();
        TrackedStack::new(items, Some(rec.clone()))
    });
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tracked(values: Vec<Value>) -> (TrackedStack, StepRecorder) {
        let recorder = StepRecorder::buffered();
        (TrackedStack::new(values, Some(recorder.clone())), recorder)
    }

    #[test]
    fn test_push_then_pop_reverses_order() {
        // Lei de ida e volta: push V, pop |V| vezes → reverse(V).
        let (stack, recorder) = tracked(vec![]);
        let values = vec![json!(1), json!(2), json!(3)];
        for v in &values {
            stack.push(v.clone());
        }
        let mut popped = Vec::new();
        for _ in 0..values.len() {
            popped.push(stack.pop().unwrap());
        }

        let mut expected = values.clone();
        expected.reverse();
        assert_eq!(popped, expected);

        // Trace: |V| pushes seguidos de |V| pops.
        let steps = recorder.steps();
        assert_eq!(steps.len(), 6);
        assert!(steps[..3].iter().all(|s| s.step_type == "push"));
        assert!(steps[3..].iter().all(|s| s.step_type == "pop"));
    }

    #[test]
    fn test_pop_empty_throws_documented_message() {
        let (stack, _) = tracked(vec![]);
        assert_eq!(stack.pop().unwrap_err(), "Stack underflow");
    }

    #[test]
    fn test_peek_emits_step_without_removing() {
        let (stack, recorder) = tracked(vec![json!(7)]);
        assert_eq!(stack.peek(), json!(7));
        assert_eq!(stack.len(), 1);
        assert_eq!(recorder.steps()[0].step_type, "peek");
    }

    #[test]
    fn test_preload_is_silent() {
        let (stack, recorder) = tracked(vec![json!(1), json!(2)]);
        assert_eq!(stack.len(), 2);
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn test_clear_emits_and_empties() {
        let (stack, recorder) = tracked(vec![json!(1), json!(2)]);
        stack.clear();
        assert!(stack.is_empty());
        let steps = recorder.steps();
        assert_eq!(steps[0].step_type, "clear");
        assert_eq!(steps[0].result, json!([]));
    }

    #[test]
    fn test_engine_registration() {
        let mut engine = Engine::new();
        let recorder = StepRecorder::buffered();
        register(&mut engine, &recorder);

        let result: Dynamic = engine
            .eval(
                r#"
                let s = createTrackedStack([1, 2]);
                s.push(3);
                s.pop()
                "#,
            )
            .unwrap();
        assert_eq!(dynamic_to_value(&result), json!(3));

        let err = engine
            .eval::<Dynamic>("let s = createTrackedStack(); s.pop()")
            .unwrap_err();
        assert!(err.to_string().contains("Stack underflow"));
    }
}
