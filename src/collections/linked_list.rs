//! # TrackedLinkedList - Lista Simplesmente Encadeada Instrumentada
//!
//! Lista com `head`, `tail` e `size`. Os nós são handles
//! compartilhados com propriedades `value` e `next` expostas na
//! sandbox, então o usuário pode reverter a lista manipulando
//! ponteiros diretamente (`curr.next = prev; list.head = prev;`).
//!
//! Operações instrumentadas: `append`, `prepend`, `insertAt`,
//! `delete`, `deleteAt`, `find` (um passo por nó visitado), `reverse`
//! (um passo por troca de ponteiro + passo final), `hasCycle`
//! (tartaruga-e-lebre, um passo por par verificado + passo terminal) e
//! `clear`. Escritas cruas em `next`/`head` não emitem passos (são do
//! usuário, não da biblioteca); `getData`/`toArray` caminham a partir
//! do head com guarda de ciclo.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult};
use serde_json::{json, Value};

use super::{dynamic_to_value, meta, value_to_dynamic, StepRecorder};

const TARGET: &str = "linkedList";

// ============================================================================
// NÓ
// ============================================================================

/// Handle compartilhado de um nó `{value, next}`.
#[derive(Clone)]
pub struct ListNode {
    inner: Rc<RefCell<NodeInner>>,
}

struct NodeInner {
    value: Value,
    next: Option<ListNode>,
}

impl ListNode {
    pub fn new(value: Value) -> Self {
        Self {
            inner: Rc::new(RefCell::new(NodeInner { value, next: None })),
        }
    }

    pub fn value(&self) -> Value {
        self.inner.borrow().value.clone()
    }

    pub fn set_value(&self, value: Value) {
        self.inner.borrow_mut().value = value;
    }

    pub fn next(&self) -> Option<ListNode> {
        self.inner.borrow().next.clone()
    }

    pub fn set_next(&self, next: Option<ListNode>) {
        self.inner.borrow_mut().next = next;
    }

    /// Identidade do nó (para guardas de ciclo).
    fn id(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    fn same_node(&self, other: &ListNode) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

// ============================================================================
// LISTA
// ============================================================================

/// Handle compartilhado de uma lista encadeada rastreada.
#[derive(Clone)]
pub struct TrackedLinkedList {
    inner: Rc<RefCell<ListInner>>,
    recorder: Option<StepRecorder>,
}

struct ListInner {
    head: Option<ListNode>,
    tail: Option<ListNode>,
    size: usize,
}

impl TrackedLinkedList {
    /// Cria uma lista; a carga inicial é silenciosa.
    pub fn new(initial: Vec<Value>, recorder: Option<StepRecorder>) -> Self {
        let list = Self {
            inner: Rc::new(RefCell::new(ListInner {
                head: None,
                tail: None,
                size: 0,
            })),
            recorder,
        };
        for value in initial {
            list.append_silent(value);
        }
        list
    }

    pub fn size(&self) -> usize {
        self.inner.borrow().size
    }

    pub fn head(&self) -> Option<ListNode> {
        self.inner.borrow().head.clone()
    }

    pub fn tail(&self) -> Option<ListNode> {
        self.inner.borrow().tail.clone()
    }

    pub fn set_head(&self, head: Option<ListNode>) {
        self.inner.borrow_mut().head = head;
    }

    pub fn set_tail(&self, tail: Option<ListNode>) {
        self.inner.borrow_mut().tail = tail;
    }

    /// Valores head→tail com guarda de ciclo. Não emite passo.
    pub fn to_values(&self) -> Vec<Value> {
        let mut values = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.head();
        while let Some(node) = current {
            if !seen.insert(node.id()) {
                break; // ciclo
            }
            values.push(node.value());
            current = node.next();
        }
        values
    }

    /// Snapshot JSON dos valores. Não emite passo.
    pub fn snapshot(&self) -> Value {
        Value::Array(self.to_values())
    }

    fn emit(&self, step_type: &str, args: Vec<Value>, metadata: serde_json::Map<String, Value>) {
        if let Some(recorder) = &self.recorder {
            recorder.capture(step_type, TARGET, args, self.snapshot(), metadata);
        }
    }

    fn emit_scalar(
        &self,
        step_type: &str,
        args: Vec<Value>,
        result: Value,
        metadata: serde_json::Map<String, Value>,
    ) {
        if let Some(recorder) = &self.recorder {
            recorder.capture(step_type, TARGET, args, result, metadata);
        }
    }

    fn append_silent(&self, value: Value) -> ListNode {
        let node = ListNode::new(value);
        let mut inner = self.inner.borrow_mut();
        match inner.tail.take() {
            Some(tail) => {
                tail.set_next(Some(node.clone()));
                inner.tail = Some(node.clone());
            }
            None => {
                inner.head = Some(node.clone());
                inner.tail = Some(node.clone());
            }
        }
        inner.size += 1;
        node
    }

    // ------------------------------------------------------------------
    // Operações instrumentadas
    // ------------------------------------------------------------------

    pub fn append(&self, value: Value) {
        self.append_silent(value.clone());
        let size = self.size();
        self.emit(
            "append",
            vec![value.clone()],
            meta(vec![("value", value), ("size", json!(size))]),
        );
    }

    pub fn prepend(&self, value: Value) {
        let node = ListNode::new(value.clone());
        {
            let mut inner = self.inner.borrow_mut();
            node.set_next(inner.head.take());
            if inner.tail.is_none() {
                inner.tail = Some(node.clone());
            }
            inner.head = Some(node);
            inner.size += 1;
        }
        let size = self.size();
        self.emit(
            "prepend",
            vec![value.clone()],
            meta(vec![("value", value), ("size", json!(size))]),
        );
    }

    /// Insere em `index` (0..=size). Fora de faixa é erro.
    pub fn insert_at(&self, index: i64, value: Value) -> Result<(), String> {
        let size = self.size();
        if index < 0 || index as usize > size {
            return Err(format!("Index {} out of bounds for insert (size {})", index, size));
        }

        if index == 0 {
            // Reusa o caminho do prepend sem emitir o passo dele.
            let node = ListNode::new(value.clone());
            let mut inner = self.inner.borrow_mut();
            node.set_next(inner.head.take());
            if inner.tail.is_none() {
                inner.tail = Some(node.clone());
            }
            inner.head = Some(node);
            inner.size += 1;
        } else {
            let mut prev = self.head().expect("index > 0 implies non-empty list");
            for _ in 1..index {
                prev = prev.next().expect("bounds checked above");
            }
            let node = ListNode::new(value.clone());
            node.set_next(prev.next());
            prev.set_next(Some(node.clone()));
            let mut inner = self.inner.borrow_mut();
            if node.next().is_none() {
                inner.tail = Some(node);
            }
            inner.size += 1;
        }

        self.emit(
            "insertAt",
            vec![json!(index), value.clone()],
            meta(vec![("index", json!(index)), ("value", value)]),
        );
        Ok(())
    }

    /// Remove a primeira ocorrência de `value`. Retorna se removeu.
    pub fn delete(&self, value: Value) -> bool {
        let mut index = 0usize;
        let mut found = false;
        {
            let mut inner = self.inner.borrow_mut();
            let mut prev: Option<ListNode> = None;
            let mut current = inner.head.clone();
            let mut seen = HashSet::new();

            while let Some(node) = current {
                if !seen.insert(node.id()) {
                    break;
                }
                if node.value() == value {
                    let next = node.next();
                    match &prev {
                        Some(prev_node) => prev_node.set_next(next.clone()),
                        None => inner.head = next.clone(),
                    }
                    if next.is_none() {
                        inner.tail = prev.clone();
                    }
                    inner.size = inner.size.saturating_sub(1);
                    found = true;
                    break;
                }
                prev = Some(node.clone());
                current = node.next();
                index += 1;
            }
        }

        self.emit(
            "delete",
            vec![value.clone()],
            meta(vec![
                ("value", value),
                ("found", json!(found)),
                ("index", json!(index)),
            ]),
        );
        found
    }

    /// Remove o nó em `index` (0..size). Fora de faixa é erro.
    pub fn delete_at(&self, index: i64) -> Result<Value, String> {
        let size = self.size();
        if index < 0 || index as usize >= size {
            return Err(format!("Index {} out of bounds (size {})", index, size));
        }

        let removed = {
            let mut inner = self.inner.borrow_mut();
            if index == 0 {
                let head = inner.head.take().expect("bounds checked above");
                inner.head = head.next();
                if inner.head.is_none() {
                    inner.tail = None;
                }
                inner.size -= 1;
                head.value()
            } else {
                let mut prev = inner.head.clone().expect("bounds checked above");
                for _ in 1..index {
                    prev = prev.next().expect("bounds checked above");
                }
                let target = prev.next().expect("bounds checked above");
                prev.set_next(target.next());
                if prev.next().is_none() {
                    inner.tail = Some(prev);
                }
                inner.size -= 1;
                target.value()
            }
        };

        self.emit(
            "deleteAt",
            vec![json!(index)],
            meta(vec![("index", json!(index)), ("value", removed.clone())]),
        );
        Ok(removed)
    }

    /// Busca linear; um passo por nó visitado, com metadata
    /// `comparing`/`found`. Retorna o índice, ou -1.
    pub fn find(&self, value: Value) -> i64 {
        let mut index = 0i64;
        let mut seen = HashSet::new();
        let mut current = self.head();

        while let Some(node) = current {
            if !seen.insert(node.id()) {
                break;
            }
            let node_value = node.value();
            let found = node_value == value;
            self.emit_scalar(
                "find",
                vec![value.clone()],
                json!(found),
                meta(vec![
                    ("comparing", node_value),
                    ("index", json!(index)),
                    ("found", json!(found)),
                ]),
            );
            if found {
                return index;
            }
            current = node.next();
            index += 1;
        }

        self.emit_scalar(
            "find",
            vec![value],
            json!(false),
            meta(vec![("found", json!(false)), ("index", json!(-1))]),
        );
        -1
    }

    /// Reverte a lista in-place: um passo por troca de ponteiro e um
    /// passo final de conclusão com o snapshot completo.
    pub fn reverse(&self) {
        let mut seen = HashSet::new();
        let mut index = 0i64;
        {
            let mut inner = self.inner.borrow_mut();
            let old_head = inner.head.take();
            let mut prev: Option<ListNode> = None;
            let mut current = old_head.clone();

            while let Some(node) = current {
                if !seen.insert(node.id()) {
                    break;
                }
                let next = node.next();
                node.set_next(prev.clone());
                prev = Some(node);
                current = next;
            }

            inner.head = prev;
            inner.tail = old_head;
        }

        // Passos por troca, emitidos fora do borrow para snapshots
        // consistentes no passo final.
        let total = seen.len();
        for value in self.to_values().iter().take(total) {
            self.emit_scalar(
                "reverse",
                vec![],
                value.clone(),
                meta(vec![("index", json!(index)), ("pointerSwap", json!(true))]),
            );
            index += 1;
        }
        self.emit("reverse", vec![], meta(vec![("completed", json!(true))]));
    }

    /// Detecção de ciclo de Floyd (tartaruga e lebre): um passo por
    /// par verificado e um passo terminal com o resultado.
    pub fn has_cycle(&self) -> bool {
        let mut slow = self.head();
        let mut fast = self.head();
        let mut result = false;

        loop {
            let next_fast = fast.as_ref().and_then(|f| f.next()).and_then(|f| f.next());
            let next_slow = slow.as_ref().and_then(|s| s.next());

            match (next_slow, next_fast) {
                (Some(s), Some(f)) => {
                    self.emit_scalar(
                        "hasCycle",
                        vec![],
                        Value::Null,
                        meta(vec![
                            ("slow", s.value()),
                            ("fast", f.value()),
                            ("checking", json!(true)),
                        ]),
                    );
                    if s.same_node(&f) {
                        result = true;
                        break;
                    }
                    slow = Some(s);
                    fast = Some(f);
                }
                _ => break,
            }
        }

        self.emit_scalar(
            "hasCycle",
            vec![],
            json!(result),
            meta(vec![("cycle", json!(result))]),
        );
        result
    }

    pub fn clear(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            // Quebra os elos para não vazar ciclos criados pelo usuário.
            let mut seen = HashSet::new();
            let mut current = inner.head.take();
            while let Some(node) = current {
                if !seen.insert(node.id()) {
                    break;
                }
                current = node.next();
                node.set_next(None);
            }
            inner.tail = None;
            inner.size = 0;
        }
        self.emit("clear", vec![], meta(vec![]));
    }
}

// ============================================================================
// REGISTRO NO ENGINE
// ============================================================================

fn node_to_dynamic(node: Option<ListNode>) -> Dynamic {
    match node {
        Some(node) => Dynamic::from(node),
        None => Dynamic::UNIT,
    }
}

fn dynamic_to_node(value: Dynamic) -> Result<Option<ListNode>, Box<EvalAltResult>> {
    if value.is_unit() {
        return Ok(None);
    }
    let type_name = value.type_name();
    value
        .try_cast::<ListNode>()
        .map(Some)
        .ok_or_else(|| format!("Expected a list node or (), got {}", type_name).into())
}

/// Registra os tipos, métodos e factories da lista encadeada.
pub fn register(engine: &mut Engine, recorder: &StepRecorder) {
    engine.register_type_with_name::<ListNode>("ListNode");
    engine.register_type_with_name::<TrackedLinkedList>("TrackedLinkedList");

    // Propriedades do nó: value e next (leitura e escrita).
    engine.register_get("value", |node: &mut ListNode| {
        value_to_dynamic(&node.value())
    });
    engine.register_set("value", |node: &mut ListNode, value: Dynamic| {
        node.set_value(dynamic_to_value(&value));
    });
    engine.register_get("next", |node: &mut ListNode| node_to_dynamic(node.next()));
    engine.register_set(
        "next",
        |node: &mut ListNode, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
            node.set_next(dynamic_to_node(value)?);
            Ok(())
        },
    );

    // Igualdade de nós é identidade (mesmo nó), como o usuário espera
    // ao comparar `slow == fast`. Comparação com () também é definida.
    engine.register_fn("==", |a: ListNode, b: ListNode| a.same_node(&b));
    engine.register_fn("!=", |a: ListNode, b: ListNode| !a.same_node(&b));
    engine.register_fn("==", |_: ListNode, _: ()| false);
    engine.register_fn("!=", |_: ListNode, _: ()| true);
    engine.register_fn("==", |_: (), _: ListNode| false);
    engine.register_fn("!=", |_: (), _: ListNode| true);

    // Propriedades da lista.
    engine.register_get("head", |list: &mut TrackedLinkedList| {
        node_to_dynamic(list.head())
    });
    engine.register_set(
        "head",
        |list: &mut TrackedLinkedList, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
            list.set_head(dynamic_to_node(value)?);
            Ok(())
        },
    );
    engine.register_get("tail", |list: &mut TrackedLinkedList| {
        node_to_dynamic(list.tail())
    });
    engine.register_set(
        "tail",
        |list: &mut TrackedLinkedList, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
            list.set_tail(dynamic_to_node(value)?);
            Ok(())
        },
    );
    engine.register_get("size", |list: &mut TrackedLinkedList| list.size() as i64);
    engine.register_fn("getSize", |list: &mut TrackedLinkedList| list.size() as i64);
    engine.register_fn("isEmpty", |list: &mut TrackedLinkedList| list.size() == 0);

    // Operações.
    engine.register_fn("append", |list: &mut TrackedLinkedList, value: Dynamic| {
        list.append(dynamic_to_value(&value));
    });
    engine.register_fn("prepend", |list: &mut TrackedLinkedList, value: Dynamic| {
        list.prepend(dynamic_to_value(&value));
    });
    engine.register_fn(
        "insertAt",
        |list: &mut TrackedLinkedList,
         index: i64,
         value: Dynamic|
         -> Result<(), Box<EvalAltResult>> {
            list.insert_at(index, dynamic_to_value(&value))
                .map_err(Into::into)
        },
    );
    engine.register_fn("delete", |list: &mut TrackedLinkedList, value: Dynamic| {
        list.delete(dynamic_to_value(&value))
    });
    engine.register_fn(
        "deleteAt",
        |list: &mut TrackedLinkedList, index: i64| -> Result<Dynamic, Box<EvalAltResult>> {
            list.delete_at(index)
                .map(|v| value_to_dynamic(&v))
                .map_err(Into::into)
        },
    );
    engine.register_fn("find", |list: &mut TrackedLinkedList, value: Dynamic| {
        list.find(dynamic_to_value(&value))
    });
    engine.register_fn("reverse", |list: &mut TrackedLinkedList| list.reverse());
    engine.register_fn("hasCycle", |list: &mut TrackedLinkedList| list.has_cycle());
    engine.register_fn("clear", |list: &mut TrackedLinkedList| list.clear());
    engine.register_fn("getData", |list: &mut TrackedLinkedList| {
        value_to_dynamic(&list.snapshot())
    });
    engine.register_fn("toArray", |list: &mut TrackedLinkedList| {
        value_to_dynamic(&list.snapshot())
    });

    // Factories.
    let rec = recorder.clone();
    engine.register_fn("createTrackedLinkedList", move || {
        TrackedLinkedList::new(Vec::new(), Some(rec.clone()))
    });
    let rec = recorder.clone();
    engine.register_fn("createTrackedLinkedList", move |initial: Array| {
        let items: Vec<Value> = initial.iter().map(dynamic_to_value).collect();
        TrackedLinkedList::new(items, Some(rec.clone()))
    });
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(values: Vec<Value>) -> (TrackedLinkedList, StepRecorder) {
        let recorder = StepRecorder::buffered();
        (
            TrackedLinkedList::new(values, Some(recorder.clone())),
            recorder,
        )
    }

    #[test]
    fn test_from_to_array_is_identity() {
        let values = vec![json!(10), json!(20), json!(30)];
        let (list, recorder) = tracked(values.clone());
        assert_eq!(list.to_values(), values);
        assert_eq!(list.size(), 3);
        // Preload silencioso.
        assert_eq!(recorder.count(), 0);
    }

    #[test]
    fn test_append_prepend() {
        let (list, recorder) = tracked(vec![]);
        list.append(json!(2));
        list.append(json!(3));
        list.prepend(json!(1));

        assert_eq!(list.snapshot(), json!([1, 2, 3]));
        assert_eq!(list.head().unwrap().value(), json!(1));
        assert_eq!(list.tail().unwrap().value(), json!(3));

        let steps = recorder.steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].step_type, "prepend");
        assert_eq!(steps[2].result, json!([1, 2, 3]));
    }

    #[test]
    fn test_insert_at_bounds() {
        let (list, _) = tracked(vec![json!(1), json!(3)]);
        list.insert_at(1, json!(2)).unwrap();
        assert_eq!(list.snapshot(), json!([1, 2, 3]));

        list.insert_at(3, json!(4)).unwrap(); // no fim
        assert_eq!(list.tail().unwrap().value(), json!(4));

        let err = list.insert_at(9, json!(0)).unwrap_err();
        assert!(err.contains("out of bounds"));
        assert!(list.insert_at(-1, json!(0)).is_err());
    }

    #[test]
    fn test_delete_first_match_only() {
        let (list, _) = tracked(vec![json!(1), json!(2), json!(1)]);
        assert!(list.delete(json!(1)));
        assert_eq!(list.snapshot(), json!([2, 1]));
        assert!(!list.delete(json!(9)));
    }

    #[test]
    fn test_delete_at_updates_tail() {
        let (list, _) = tracked(vec![json!(1), json!(2), json!(3)]);
        assert_eq!(list.delete_at(2).unwrap(), json!(3));
        assert_eq!(list.tail().unwrap().value(), json!(2));
        assert!(list.delete_at(5).is_err());
    }

    #[test]
    fn test_find_emits_one_step_per_visit() {
        let (list, recorder) = tracked(vec![json!(10), json!(20), json!(30)]);
        assert_eq!(list.find(json!(20)), 1);

        let steps = recorder.steps();
        assert_eq!(steps.len(), 2); // visitou 10 e 20
        assert_eq!(steps[0].metadata["comparing"], json!(10));
        assert_eq!(steps[0].metadata["found"], json!(false));
        assert_eq!(steps[1].metadata["found"], json!(true));

        assert_eq!(list.find(json!(99)), -1);
    }

    #[test]
    fn test_reverse_twice_restores() {
        let values = vec![json!(10), json!(20), json!(30), json!(40), json!(50)];
        let (list, recorder) = tracked(values.clone());

        list.reverse();
        assert_eq!(list.snapshot(), json!([50, 40, 30, 20, 10]));
        assert_eq!(list.head().unwrap().value(), json!(50));
        assert_eq!(list.tail().unwrap().value(), json!(10));

        // Um passo por troca de ponteiro + conclusão.
        let steps = recorder.steps();
        assert_eq!(steps.len(), 6);
        assert_eq!(steps.last().unwrap().metadata["completed"], json!(true));

        list.reverse();
        assert_eq!(list.to_values(), values);
    }

    #[test]
    fn test_reverse_single_element_is_noop() {
        let (list, _) = tracked(vec![json!(7)]);
        list.reverse();
        assert_eq!(list.snapshot(), json!([7]));
        assert_eq!(list.head().unwrap().value(), json!(7));
    }

    #[test]
    fn test_has_cycle_false_for_appended_list() {
        let (list, recorder) = tracked(vec![json!(1), json!(2), json!(3)]);
        assert!(!list.has_cycle());
        let last = recorder.steps().into_iter().last().unwrap();
        assert_eq!(last.result, json!(false));
    }

    #[test]
    fn test_has_cycle_detects_manual_cycle() {
        let (list, _) = tracked(vec![json!(1), json!(2), json!(3)]);
        // Fecha o ciclo: tail.next = head.
        list.tail().unwrap().set_next(list.head());
        assert!(list.has_cycle());
        // toArray continua terminando graças à guarda de ciclo.
        assert_eq!(list.to_values().len(), 3);
    }

    #[test]
    fn test_pointer_manipulation_via_nodes() {
        // Reversão manual, como o usuário faria na sandbox.
        let (list, _) = tracked(vec![json!(1), json!(2), json!(3)]);
        let mut prev: Option<ListNode> = None;
        let mut current = list.head();
        while let Some(node) = current {
            let next = node.next();
            node.set_next(prev.clone());
            prev = Some(node);
            current = next;
        }
        let old_head = list.head();
        list.set_head(prev);
        list.set_tail(old_head);

        assert_eq!(list.snapshot(), json!([3, 2, 1]));
    }

    #[test]
    fn test_clear() {
        let (list, recorder) = tracked(vec![json!(1), json!(2)]);
        list.clear();
        assert_eq!(list.size(), 0);
        assert!(list.head().is_none());
        assert_eq!(recorder.steps()[0].result, json!([]));
    }

    #[test]
    fn test_engine_pointer_reversal() {
        let mut engine = Engine::new();
        let recorder = StepRecorder::buffered();
        register(&mut engine, &recorder);

        let result: Array = engine
            .eval(
                r#"
                let list = createTrackedLinkedList([10, 20, 30, 40, 50]);
                let prev = ();
                let curr = list.head;
                while curr != () {
                    let next = curr.next;
                    curr.next = prev;
                    prev = curr;
                    curr = next;
                }
                list.head = prev;
                list.toArray()
                "#,
            )
            .unwrap();

        let values: Vec<Value> = result.iter().map(dynamic_to_value).collect();
        assert_eq!(
            values,
            vec![json!(50), json!(40), json!(30), json!(20), json!(10)]
        );
    }

    #[test]
    fn test_engine_find_and_size() {
        let mut engine = Engine::new();
        let recorder = StepRecorder::buffered();
        register(&mut engine, &recorder);

        let found: i64 = engine
            .eval("let l = createTrackedLinkedList([5, 6]); l.find(6)")
            .unwrap();
        assert_eq!(found, 1);

        let size: i64 = engine
            .eval("let l = createTrackedLinkedList([5, 6]); l.size")
            .unwrap();
        assert_eq!(size, 2);
    }
}
