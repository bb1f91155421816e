//! # TrackedQueue - Fila FIFO Instrumentada
//!
//! `enqueue`, `dequeue` (lança "Queue underflow" vazia), `peek` e
//! `clear`. Mesmo contrato da pilha: peek emite passo, preload é
//! silencioso.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult};
use serde_json::Value;

use super::{dynamic_to_value, meta, value_to_dynamic, StepRecorder};

const TARGET: &str = "queue";

/// Handle compartilhado de uma fila rastreada (frente no início).
#[derive(Clone)]
pub struct TrackedQueue {
    items: Rc<RefCell<VecDeque<Value>>>,
    recorder: Option<StepRecorder>,
}

impl TrackedQueue {
    /// Cria uma fila; a carga inicial não gera passos.
    pub fn new(initial: Vec<Value>, recorder: Option<StepRecorder>) -> Self {
        Self {
            items: Rc::new(RefCell::new(initial.into())),
            recorder,
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Snapshot frente→fim. Não emite passo.
    pub fn snapshot(&self) -> Value {
        Value::Array(self.items.borrow().iter().cloned().collect())
    }

    fn emit(&self, step_type: &str, args: Vec<Value>, metadata: serde_json::Map<String, Value>) {
        if let Some(recorder) = &self.recorder {
            recorder.capture(step_type, TARGET, args, self.snapshot(), metadata);
        }
    }

    pub fn enqueue(&self, value: Value) {
        self.items.borrow_mut().push_back(value.clone());
        self.emit("enqueue", vec![value.clone()], meta(vec![("value", value)]));
    }

    /// Remove e retorna a frente. Fila vazia é erro.
    pub fn dequeue(&self) -> Result<Value, String> {
        let removed = self
            .items
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| "Queue underflow".to_string())?;
        self.emit("dequeue", vec![], meta(vec![("value", removed.clone())]));
        Ok(removed)
    }

    /// Olha a frente sem remover. Emite passo (leitura documentada).
    pub fn peek(&self) -> Value {
        let front = self.items.borrow().front().cloned().unwrap_or(Value::Null);
        self.emit("peek", vec![], meta(vec![("value", front.clone())]));
        front
    }

    pub fn clear(&self) {
        self.items.borrow_mut().clear();
        self.emit("clear", vec![], meta(vec![]));
    }
}

// ============================================================================
// REGISTRO NO ENGINE
// ============================================================================

/// Registra o tipo, os métodos e os factories de TrackedQueue.
pub fn register(engine: &mut Engine, recorder: &StepRecorder) {
    engine.register_type_with_name::<TrackedQueue>("TrackedQueue");

    engine.register_fn("enqueue", |queue: &mut TrackedQueue, value: Dynamic| {
        queue.enqueue(dynamic_to_value(&value));
    });
    engine.register_fn(
        "dequeue",
        |queue: &mut TrackedQueue| -> Result<Dynamic, Box<EvalAltResult>> {
            queue
                .dequeue()
                .map(|v| value_to_dynamic(&v))
                .map_err(Into::into)
        },
    );
    engine.register_fn("peek", |queue: &mut TrackedQueue| {
        value_to_dynamic(&queue.peek())
    });
    engine.register_fn("clear", |queue: &mut TrackedQueue| queue.clear());
    engine.register_fn("getSize", |queue: &mut TrackedQueue| queue.len() as i64);
    engine.register_fn("len", |queue: &mut TrackedQueue| queue.len() as i64);
    engine.register_fn("isEmpty", |queue: &mut TrackedQueue| queue.is_empty());
    engine.register_get("length", |queue: &mut TrackedQueue| queue.len() as i64);
    engine.register_fn("getData", |queue: &mut TrackedQueue| {
        value_to_dynamic(&queue.snapshot())
    });
    engine.register_fn("toArray", |queue: &mut TrackedQueue| {
        value_to_dynamic(&queue.snapshot())
    });

    let rec = recorder.clone();
    engine.register_fn("createTrackedQueue", move || {
        TrackedQueue::new(Vec::new(), Some(rec.clone()))
    });
    let rec = recorder.clone();
    engine.register_fn("createTrackedQueue", move |initial: Array| {
        let items: Vec<Value> = initial.iter().map(dynamic_to_value).collect();
        TrackedQueue::new(items, Some(rec.clone()))
    });
}

// ============================================================================
// TESTES
// ============================================================================
