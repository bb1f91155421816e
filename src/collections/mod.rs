//! # Módulo de Coleções Rastreadas
//!
//! Sete estruturas de dados instrumentadas: toda operação de mutação
//! (e algumas leituras documentadas, como `find`/`search`/`peek`)
//! registra um `TraceStep` através do gravador da run. A UI anima a
//! sequência de passos depois.
//!
//! ## Contrato comum
//!
//! - Cada coleção é um **handle compartilhado**: clonar o valor dentro
//!   da sandbox (atribuição, passagem para função) continua apontando
//!   para a mesma instância. Mutações feitas dentro da função do
//!   usuário são visíveis no harness.
//! - Sem gravador (`recorder: None`) a coleção funciona normalmente,
//!   só não emite trace.
//! - `getData()`/`toArray()` devolvem um snapshot, nunca uma referência
//!   viva, e não emitem passo.
//! - Acesso fora de faixa lança erro com mensagem descritiva.
//!
//! ## Bundles
//!
//! Cada run registra no engine apenas as famílias selecionadas pelo
//! prefixo do desafio (`array-`, `linkedlist-`, ...). Os factories
//! (`createTrackedArray`, ...) fecham sobre o gravador daquela run.

pub mod array;
pub mod binary_tree;
pub mod graph;
pub mod hash_map;
pub mod linked_list;
pub mod queue;
pub mod stack;

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;
use std::time::Instant;

use rhai::{Dynamic, Engine};
use serde_json::{Map, Value};

use crate::protocol::TraceStep;

// ============================================================================
// FAMÍLIAS DE COLEÇÃO
// ============================================================================

/// Família de coleção rastreada; seleciona o bundle registrado na run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionFamily {
    Array,
    LinkedList,
    Stack,
    Queue,
    BinaryTree,
    Graph,
    HashMap,
}

impl CollectionFamily {
    /// Todas as famílias, na ordem canônica. Runs de solução de
    /// referência registram tudo.
    pub const ALL: [CollectionFamily; 7] = [
        CollectionFamily::Array,
        CollectionFamily::LinkedList,
        CollectionFamily::Stack,
        CollectionFamily::Queue,
        CollectionFamily::BinaryTree,
        CollectionFamily::Graph,
        CollectionFamily::HashMap,
    ];
}

/// Registra os bundles pedidos no engine da run.
///
/// Famílias duplicadas são ignoradas; a ordem de registro é estável.
pub fn register_bundles(engine: &mut Engine, families: &[CollectionFamily], recorder: &StepRecorder) {
    let mut seen: Vec<CollectionFamily> = Vec::new();
    for family in families {
        if seen.contains(family) {
            continue;
        }
        seen.push(*family);
        match family {
            CollectionFamily::Array => array::register(engine, recorder),
            CollectionFamily::LinkedList => linked_list::register(engine, recorder),
            CollectionFamily::Stack => stack::register(engine, recorder),
            CollectionFamily::Queue => queue::register(engine, recorder),
            CollectionFamily::BinaryTree => binary_tree::register(engine, recorder),
            CollectionFamily::Graph => graph::register(engine, recorder),
            CollectionFamily::HashMap => hash_map::register(engine, recorder),
        }
    }
}

// ============================================================================
// GRAVADOR DE PASSOS
// ============================================================================

/// Gravador de passos de uma run.
///
/// Mantém o buffer local ordenado (o que vai no `execution-complete`)
/// e repassa cada passo ao emissor (que posta o envelope
/// `capture-step` para o host). Timestamps são monotônicos por run.
///
/// Clones compartilham o mesmo buffer: é um handle, como as coleções.
#[derive(Clone)]
pub struct StepRecorder {
    inner: Rc<RecorderInner>,
}

struct RecorderInner {
    origin: Instant,
    steps: RefCell<Vec<TraceStep>>,
    emit: Box<dyn Fn(&TraceStep)>,
}

impl StepRecorder {
    /// Cria um gravador que repassa cada passo ao emissor dado.
    pub fn new(emit: impl Fn(&TraceStep) + 'static) -> Self {
        Self {
            inner: Rc::new(RecorderInner {
                origin: Instant::now(),
                steps: RefCell::new(Vec::new()),
                emit: Box::new(emit),
            }),
        }
    }

    /// Gravador que só acumula no buffer (testes).
    pub fn buffered() -> Self {
        Self::new(|_| {})
    }

    /// Registra um passo: carimba o timestamp da run, acumula no
    /// buffer local e repassa ao emissor.
    pub fn record(&self, mut step: TraceStep) {
        step.timestamp = self.inner.origin.elapsed().as_millis() as u64;
        (self.inner.emit)(&step);
        self.inner.steps.borrow_mut().push(step);
    }

    /// Monta e registra um passo de uma vez.
    pub fn capture(
        &self,
        step_type: &str,
        target: &str,
        args: Vec<Value>,
        result: Value,
        metadata: Map<String, Value>,
    ) {
        let mut step = TraceStep::new(step_type, target);
        step.args = args;
        step.result = result;
        step.metadata = metadata;
        self.record(step);
    }

    /// Snapshot do buffer local, em ordem de emissão.
    pub fn steps(&self) -> Vec<TraceStep> {
        self.inner.steps.borrow().clone()
    }

    /// Quantos passos já foram registrados.
    pub fn count(&self) -> usize {
        self.inner.steps.borrow().len()
    }
}

// ============================================================================
// PONTE DYNAMIC ↔ JSON
// ============================================================================

/// Converte um valor da sandbox para JSON, com consciência das
/// coleções rastreadas: uma coleção vira o snapshot dela, não uma
/// serialização opaca.
pub fn dynamic_to_value(value: &Dynamic) -> Value {
    if let Some(arr) = value.clone().try_cast::<array::TrackedArray>() {
        return arr.snapshot();
    }
    if let Some(list) = value.clone().try_cast::<linked_list::TrackedLinkedList>() {
        return list.snapshot();
    }
    if let Some(stack) = value.clone().try_cast::<stack::TrackedStack>() {
        return stack.snapshot();
    }
    if let Some(queue) = value.clone().try_cast::<queue::TrackedQueue>() {
        return queue.snapshot();
    }
    if let Some(tree) = value.clone().try_cast::<binary_tree::TrackedBinaryTree>() {
        return tree.snapshot();
    }
    if let Some(graph) = value.clone().try_cast::<graph::TrackedGraph>() {
        return graph.snapshot();
    }
    if let Some(map) = value.clone().try_cast::<hash_map::TrackedHashMap>() {
        return map.snapshot();
    }

    rhai::serde::from_dynamic::<Value>(value)
        .unwrap_or_else(|_| Value::String(format!("<{}>", value.type_name())))
}

/// Converte JSON para um valor da sandbox.
pub fn value_to_dynamic(value: &Value) -> Dynamic {
    rhai::serde::to_dynamic(value).unwrap_or(Dynamic::UNIT)
}

/// Monta um mapa de metadata a partir de pares chave/valor.
pub(crate) fn meta(entries: Vec<(&str, Value)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in entries {
        map.insert(key.to_string(), value);
    }
    map
}

/// Anexa `lineNumber` ao metadata quando a posição da chamada no fonte
/// original é conhecida (melhor esforço; recurso opcional da UI).
pub(crate) fn with_line(mut metadata: Map<String, Value>, line: Option<u32>) -> Map<String, Value> {
    if let Some(line) = line {
        metadata.insert("lineNumber".to_string(), Value::from(line));
    }
    metadata
}

// ============================================================================
// COMPARAÇÃO DE VALORES
// ============================================================================

/// Nome amigável do tipo de um valor JSON (para mensagens de erro).
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Comparação determinística usada por sort/partition/compare e pela
/// árvore de busca. Números comparam como f64, strings
/// lexicograficamente, booleanos como false < true. Tipos mistos são
/// erro descritivo (nada de coerção implícita).
pub fn cmp_values(a: &Value, b: &Value) -> Result<Ordering, String> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            let (x, y) = (a.as_f64().unwrap(), b.as_f64().unwrap());
            x.partial_cmp(&y)
                .ok_or_else(|| "Cannot compare NaN values".to_string())
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        _ => Err(format!(
            "Cannot compare {} with {}",
            value_type_name(a),
            value_type_name(b)
        )),
    }
}

// ============================================================================
// TESTES
// ============================================================================
