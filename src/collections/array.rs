//! # TrackedArray - Sequência Ordenada Instrumentada
//!
//! Sequência de acesso aleatório com as operações nativas de array
//! (indexação, `length`, push/pop/shift/unshift/splice/sort/reverse/
//! fill/copyWithin) e duas operações compostas para visualização de
//! ordenação: `swap(i, j)` e `partition(low, high)` (esquema de
//! Lomuto, emitindo um `swap` por troca interna e um `partition` final
//! com o índice do pivô). `compare(i, j)` emite um passo com o
//! resultado da comparação.
//!
//! Leituras (`getData`, `toArray`, indexação, `len`) não emitem passo.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult, FnPtr, NativeCallContext};
use serde_json::{json, Value};

use super::{cmp_values, dynamic_to_value, meta, value_to_dynamic, with_line, StepRecorder};

const TARGET: &str = "array";

// ============================================================================
// TIPO
// ============================================================================

/// Handle compartilhado de um array rastreado.
///
/// Clones apontam para o mesmo armazenamento: a instância que o
/// harness criou e a que a função do usuário recebeu são o mesmo dado.
#[derive(Clone)]
pub struct TrackedArray {
    items: Rc<RefCell<Vec<Value>>>,
    recorder: Option<StepRecorder>,
}

impl TrackedArray {
    /// Cria um array rastreado. A carga inicial é silenciosa (não gera
    /// passos): o trace reflete apenas as operações do usuário.
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

    /// Snapshot dos itens (nunca uma referência viva). Não emite passo.
    pub fn snapshot(&self) -> Value {
        Value::Array(self.items.borrow().clone())
    }

    fn emit(&self, step_type: &str, args: Vec<Value>, metadata: serde_json::Map<String, Value>) {
        if let Some(recorder) = &self.recorder {
            recorder.capture(step_type, TARGET, args, self.snapshot(), metadata);
        }
    }

    fn check_index(&self, index: i64, len: usize) -> Result<usize, String> {
        if index < 0 || index as usize >= len {
            return Err(format!("Index {} out of bounds (length {})", index, len));
        }
        Ok(index as usize)
    }

    // ------------------------------------------------------------------
    // Acesso indexado
    // ------------------------------------------------------------------

    pub fn get(&self, index: i64) -> Result<Value, String> {
        let items = self.items.borrow();
        let idx = self.check_index(index, items.len())?;
        Ok(items[idx].clone())
    }

    /// Atribuição de elemento (`arr[i] = v`). Escrever em `len` anexa
    /// ao final, como em arrays dinâmicos.
    pub fn set(&self, index: i64, value: Value) -> Result<(), String> {
        let len = self.len();
        if index < 0 || index as usize > len {
            return Err(format!("Index {} out of bounds (length {})", index, len));
        }
        {
            let mut items = self.items.borrow_mut();
            if index as usize == len {
                items.push(value.clone());
            } else {
                items[index as usize] = value.clone();
            }
        }
        self.emit(
            "set",
            vec![json!(index), value.clone()],
            meta(vec![("index", json!(index)), ("value", value)]),
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutações nativas
    // ------------------------------------------------------------------

    /// Anexa ao final; retorna o novo comprimento.
    pub fn push(&self, value: Value) -> i64 {
        self.items.borrow_mut().push(value.clone());
        let len = self.len() as i64;
        self.emit("push", vec![value.clone()], meta(vec![("value", value)]));
        len
    }

    /// Remove do final; retorna o removido (ou null num array vazio).
    pub fn pop(&self) -> Value {
        let removed = self.items.borrow_mut().pop().unwrap_or(Value::Null);
        self.emit("pop", vec![], meta(vec![("value", removed.clone())]));
        removed
    }

    /// Remove do início; retorna o removido (ou null num array vazio).
    pub fn shift(&self) -> Value {
        let removed = {
            let mut items = self.items.borrow_mut();
            if items.is_empty() {
                Value::Null
            } else {
                items.remove(0)
            }
        };
        self.emit("shift", vec![], meta(vec![("value", removed.clone())]));
        removed
    }

    /// Insere no início; retorna o novo comprimento.
    pub fn unshift(&self, value: Value) -> i64 {
        self.items.borrow_mut().insert(0, value.clone());
        let len = self.len() as i64;
        self.emit("unshift", vec![value.clone()], meta(vec![("value", value)]));
        len
    }

    /// Remove `delete_count` itens a partir de `start` e insere
    /// `inserted` no lugar; retorna os removidos. Índices negativos
    /// contam do fim, como nos arrays da sandbox.
    pub fn splice(&self, start: i64, delete_count: i64, inserted: Vec<Value>) -> Vec<Value> {
        let removed = {
            let mut items = self.items.borrow_mut();
            let len = items.len() as i64;
            let start = if start < 0 {
                (len + start).max(0) as usize
            } else {
                start.min(len) as usize
            };
            let delete_count = delete_count.max(0) as usize;
            let end = (start + delete_count).min(items.len());
            let removed: Vec<Value> = items.splice(start..end, inserted.clone()).collect();
            removed
        };
        let mut args = vec![json!(start), json!(delete_count)];
        args.extend(inserted);
        self.emit("splice", args, meta(vec![("removed", Value::Array(removed.clone()))]));
        removed
    }

    /// Ordena com a comparação padrão (números crescentes, strings
    /// lexicográficas). Tipos mistos são erro.
    pub fn sort(&self) -> Result<(), String> {
        {
            let mut items = self.items.borrow_mut();
            let mut error: Option<String> = None;
            items.sort_by(|a, b| {
                if error.is_some() {
                    return Ordering::Equal;
                }
                match cmp_values(a, b) {
                    Ok(ordering) => ordering,
                    Err(e) => {
                        error = Some(e);
                        Ordering::Equal
                    }
                }
            });
            if let Some(e) = error {
                return Err(e);
            }
        }
        self.emit("sort", vec![], meta(vec![]));
        Ok(())
    }

    /// Ordena com um comparador (resultado negativo = a antes de b).
    /// O comparador vem da sandbox; erros dele propagam.
    pub fn sort_with<F>(&self, mut compare: F) -> Result<(), Box<EvalAltResult>>
    where
        F: FnMut(&Value, &Value) -> Result<Ordering, Box<EvalAltResult>>,
    {
        {
            let mut items = self.items.borrow_mut();
            let mut error: Option<Box<EvalAltResult>> = None;
            items.sort_by(|a, b| {
                if error.is_some() {
                    return Ordering::Equal;
                }
                match compare(a, b) {
                    Ok(ordering) => ordering,
                    Err(e) => {
                        error = Some(e);
                        Ordering::Equal
                    }
                }
            });
            if let Some(e) = error {
                return Err(e);
            }
        }
        self.emit("sort", vec![], meta(vec![("comparator", json!(true))]));
        Ok(())
    }

    pub fn reverse(&self) {
        self.items.borrow_mut().reverse();
        self.emit("reverse", vec![], meta(vec![]));
    }

    /// Preenche `[start, end)` com `value` (índices negativos contam
    /// do fim).
    pub fn fill(&self, value: Value, start: Option<i64>, end: Option<i64>) {
        {
            let mut items = self.items.borrow_mut();
            let len = items.len() as i64;
            let norm = |idx: i64| -> usize {
                if idx < 0 {
                    (len + idx).clamp(0, len) as usize
                } else {
                    idx.clamp(0, len) as usize
                }
            };
            let start_idx = norm(start.unwrap_or(0));
            let end_idx = norm(end.unwrap_or(len));
            for slot in items[start_idx..end_idx.max(start_idx)].iter_mut() {
                *slot = value.clone();
            }
        }
        self.emit(
            "fill",
            vec![value.clone(), json!(start), json!(end)],
            meta(vec![("value", value)]),
        );
    }

    /// Copia `[start, end)` para a posição `target`, dentro do próprio
    /// array, sem mudar o comprimento.
    pub fn copy_within(&self, target: i64, start: i64, end: Option<i64>) {
        {
            let mut items = self.items.borrow_mut();
            let len = items.len() as i64;
            let norm = |idx: i64| -> usize {
                if idx < 0 {
                    (len + idx).clamp(0, len) as usize
                } else {
                    idx.clamp(0, len) as usize
                }
            };
            let target_idx = norm(target);
            let start_idx = norm(start);
            let end_idx = norm(end.unwrap_or(len));
            let window: Vec<Value> = items[start_idx..end_idx.max(start_idx)].to_vec();
            for (offset, value) in window.into_iter().enumerate() {
                let dest = target_idx + offset;
                if dest >= items.len() {
                    break;
                }
                items[dest] = value;
            }
        }
        self.emit(
            "copyWithin",
            vec![json!(target), json!(start), json!(end)],
            meta(vec![]),
        );
    }

    // ------------------------------------------------------------------
    // Operações compostas de ordenação
    // ------------------------------------------------------------------

    /// Troca os elementos `i` e `j`, emitindo um passo `swap`.
    pub fn swap(&self, i: i64, j: i64, line: Option<u32>) -> Result<(), String> {
        {
            let mut items = self.items.borrow_mut();
            let len = items.len();
            let a = self.check_index(i, len)?;
            let b = self.check_index(j, len)?;
            items.swap(a, b);
        }
        self.emit(
            "swap",
            vec![json!(i), json!(j)],
            with_line(meta(vec![("i", json!(i)), ("j", json!(j))]), line),
        );
        Ok(())
    }

    /// Compara os elementos `i` e `j`; retorna -1, 0 ou 1 e emite um
    /// passo `compare` com o desfecho.
    pub fn compare(&self, i: i64, j: i64, line: Option<u32>) -> Result<i64, String> {
        let (left, right, outcome) = {
            let items = self.items.borrow();
            let len = items.len();
            let a = self.check_index(i, len)?;
            let b = self.check_index(j, len)?;
            let outcome = match cmp_values(&items[a], &items[b])? {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            };
            (items[a].clone(), items[b].clone(), outcome)
        };
        if let Some(recorder) = &self.recorder {
            recorder.capture(
                "compare",
                TARGET,
                vec![json!(i), json!(j)],
                json!(outcome),
                with_line(
                    meta(vec![("left", left), ("right", right)]),
                    line,
                ),
            );
        }
        Ok(outcome)
    }

    /// Particiona `[low, high]` pelo esquema de Lomuto (pivô em
    /// `high`). Cada troca interna emite um `swap`; ao final sai um
    /// passo `partition` com o índice do pivô. Retorna o índice.
    pub fn partition(&self, low: i64, high: i64, line: Option<u32>) -> Result<i64, String> {
        let len = self.len();
        let low_idx = self.check_index(low, len)?;
        let high_idx = self.check_index(high, len)?;
        if low_idx > high_idx {
            return Err(format!("Invalid partition range [{}..{}]", low, high));
        }

        let pivot = self.items.borrow()[high_idx].clone();
        let mut boundary = low_idx as i64 - 1;

        for j in low_idx..high_idx {
            let current = self.items.borrow()[j].clone();
            if cmp_values(&current, &pivot)? != Ordering::Greater {
                boundary += 1;
                if boundary as usize != j {
                    self.swap(boundary, j as i64, line)?;
                }
            }
        }

        let pivot_index = boundary + 1;
        if pivot_index as usize != high_idx {
            self.swap(pivot_index, high_idx as i64, line)?;
        }

        self.emit(
            "partition",
            vec![json!(low), json!(high)],
            with_line(
                meta(vec![
                    ("pivotIndex", json!(pivot_index)),
                    ("pivot", pivot),
                    ("low", json!(low)),
                    ("high", json!(high)),
                ]),
                line,
            ),
        );
        Ok(pivot_index)
    }
}

// ============================================================================
// REGISTRO NO ENGINE
// ============================================================================

fn call_line(ctx: &NativeCallContext) -> Option<u32> {
    ctx.position().line().map(|l| l as u32)
}

/// Interpreta o retorno de um comparador da sandbox como ordering.
fn ordering_from_dynamic(value: &Dynamic) -> Result<Ordering, Box<EvalAltResult>> {
    if let Some(n) = value.clone().try_cast::<i64>() {
        return Ok(n.cmp(&0));
    }
    if let Some(f) = value.clone().try_cast::<f64>() {
        return Ok(f.partial_cmp(&0.0).unwrap_or(Ordering::Equal));
    }
    Err(format!(
        "Comparator must return a number, got {}",
        value.type_name()
    )
    .into())
}

/// Registra o tipo, os métodos e os factories de TrackedArray.
pub fn register(engine: &mut Engine, recorder: &StepRecorder) {
    engine.register_type_with_name::<TrackedArray>("TrackedArray");

    // Indexação nativa + length.
    engine.register_indexer_get(
        |arr: &mut TrackedArray, index: i64| -> Result<Dynamic, Box<EvalAltResult>> {
            arr.get(index)
                .map(|v| value_to_dynamic(&v))
                .map_err(Into::into)
        },
    );
    engine.register_indexer_set(
        |arr: &mut TrackedArray, index: i64, value: Dynamic| -> Result<(), Box<EvalAltResult>> {
            arr.set(index, dynamic_to_value(&value)).map_err(Into::into)
        },
    );
    engine.register_get("length", |arr: &mut TrackedArray| arr.len() as i64);
    engine.register_fn("len", |arr: &mut TrackedArray| arr.len() as i64);
    engine.register_fn("isEmpty", |arr: &mut TrackedArray| arr.is_empty());

    // Mutações nativas.
    engine.register_fn("push", |arr: &mut TrackedArray, value: Dynamic| {
        arr.push(dynamic_to_value(&value))
    });
    engine.register_fn("pop", |arr: &mut TrackedArray| {
        let removed = arr.pop();
        value_to_dynamic(&removed)
    });
    engine.register_fn("shift", |arr: &mut TrackedArray| {
        let removed = arr.shift();
        value_to_dynamic(&removed)
    });
    engine.register_fn("unshift", |arr: &mut TrackedArray, value: Dynamic| {
        arr.unshift(dynamic_to_value(&value))
    });
    engine.register_fn(
        "splice",
        |arr: &mut TrackedArray, start: i64, delete_count: i64| {
            let removed = arr.splice(start, delete_count, Vec::new());
            value_to_dynamic(&Value::Array(removed))
        },
    );
    engine.register_fn(
        "splice",
        |arr: &mut TrackedArray, start: i64, delete_count: i64, items: Array| {
            let inserted: Vec<Value> = items.iter().map(dynamic_to_value).collect();
            let removed = arr.splice(start, delete_count, inserted);
            value_to_dynamic(&Value::Array(removed))
        },
    );
    engine.register_fn(
        "sort",
        |arr: &mut TrackedArray| -> Result<(), Box<EvalAltResult>> {
            arr.sort().map_err(Into::into)
        },
    );
    engine.register_fn(
        "sort",
        |ctx: NativeCallContext,
         arr: &mut TrackedArray,
         comparator: FnPtr|
         -> Result<(), Box<EvalAltResult>> {
            arr.sort_with(|a, b| {
                let outcome: Dynamic = comparator
                    .call_within_context(&ctx, (value_to_dynamic(a), value_to_dynamic(b)))?;
                ordering_from_dynamic(&outcome)
            })
        },
    );
    engine.register_fn("reverse", |arr: &mut TrackedArray| arr.reverse());
    engine.register_fn("fill", |arr: &mut TrackedArray, value: Dynamic| {
        arr.fill(dynamic_to_value(&value), None, None)
    });
    engine.register_fn(
        "fill",
        |arr: &mut TrackedArray, value: Dynamic, start: i64| {
            arr.fill(dynamic_to_value(&value), Some(start), None)
        },
    );
    engine.register_fn(
        "fill",
        |arr: &mut TrackedArray, value: Dynamic, start: i64, end: i64| {
            arr.fill(dynamic_to_value(&value), Some(start), Some(end))
        },
    );
    engine.register_fn(
        "copyWithin",
        |arr: &mut TrackedArray, target: i64, start: i64| arr.copy_within(target, start, None),
    );
    engine.register_fn(
        "copyWithin",
        |arr: &mut TrackedArray, target: i64, start: i64, end: i64| {
            arr.copy_within(target, start, Some(end))
        },
    );

    // Operações compostas.
    engine.register_fn(
        "swap",
        |ctx: NativeCallContext,
         arr: &mut TrackedArray,
         i: i64,
         j: i64|
         -> Result<(), Box<EvalAltResult>> {
            arr.swap(i, j, call_line(&ctx)).map_err(Into::into)
        },
    );
    engine.register_fn(
        "compare",
        |ctx: NativeCallContext,
         arr: &mut TrackedArray,
         i: i64,
         j: i64|
         -> Result<i64, Box<EvalAltResult>> {
            arr.compare(i, j, call_line(&ctx)).map_err(Into::into)
        },
    );
    engine.register_fn(
        "partition",
        |ctx: NativeCallContext,
         arr: &mut TrackedArray,
         low: i64,
         high: i64|
         -> Result<i64, Box<EvalAltResult>> {
            arr.partition(low, high, call_line(&ctx)).map_err(Into::into)
        },
    );

    // Snapshots.
    engine.register_fn("getData", |arr: &mut TrackedArray| {
        value_to_dynamic(&arr.snapshot())
    });
    engine.register_fn("toArray", |arr: &mut TrackedArray| {
        value_to_dynamic(&arr.snapshot())
    });

    // Factories da run.
    let rec = recorder.clone();
    engine.register_fn("createTrackedArray", move || {
        TrackedArray::new(Vec::new(), Some(rec.clone()))
    });
    let rec = recorder.clone();
    engine.register_fn("createTrackedArray", move |initial: Array| {
        let items: Vec<Value> = initial.iter().map(dynamic_to_value).collect();
        TrackedArray::new(items, Some(rec.clone()))
    });
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tracked(values: Vec<Value>) -> (TrackedArray, StepRecorder) {
        let recorder = StepRecorder::buffered();
        (TrackedArray::new(values, Some(recorder.clone())), recorder)
    }

    #[test]
    fn test_push_pop_emit_one_step_each() {
        let (arr, recorder) = tracked(vec![]);
        arr.push(json!(1));
        arr.push(json!(2));
        let popped = arr.pop();

        assert_eq!(popped, json!(2));
        let steps = recorder.steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].step_type, "push");
        assert_eq!(steps[2].step_type, "pop");
        assert_eq!(steps[2].result, json!([1]));
        assert!(steps.iter().all(|s| s.target == "array"));
    }

    #[test]
    fn test_set_within_bounds_and_append() {
        let (arr, recorder) = tracked(vec![json!(1), json!(2)]);
        arr.set(0, json!(9)).unwrap();
        arr.set(2, json!(3)).unwrap(); // anexa em len
        assert_eq!(arr.snapshot(), json!([9, 2, 3]));
        assert!(arr.set(5, json!(0)).is_err());
        assert_eq!(recorder.count(), 2);
    }

    #[test]
    fn test_get_out_of_bounds_message() {
        let (arr, _) = tracked(vec![json!(1)]);
        let err = arr.get(3).unwrap_err();
        assert_eq!(err, "Index 3 out of bounds (length 1)");
        assert!(arr.get(-1).is_err());
    }

    #[test]
    fn test_swap_emits_snapshot_after_operation() {
        let (arr, recorder) = tracked(vec![json!(1), json!(2), json!(3)]);
        arr.swap(0, 2, Some(7)).unwrap();

        assert_eq!(arr.snapshot(), json!([3, 2, 1]));
        let steps = recorder.steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_type, "swap");
        assert_eq!(steps[0].result, json!([3, 2, 1]));
        assert_eq!(steps[0].metadata["lineNumber"], json!(7));
    }

    #[test]
    fn test_compare_outcome() {
        let (arr, recorder) = tracked(vec![json!(5), json!(2)]);
        assert_eq!(arr.compare(0, 1, None).unwrap(), 1);
        assert_eq!(arr.compare(1, 0, None).unwrap(), -1);
        assert_eq!(arr.compare(0, 0, None).unwrap(), 0);

        let steps = recorder.steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].step_type, "compare");
        assert_eq!(steps[0].result, json!(1));
    }

    #[test]
    fn test_partition_lomuto_pivot_index() {
        let (arr, recorder) = tracked(vec![json!(7), json!(2), json!(9), json!(4), json!(5)]);
        let pivot_index = arr.partition(0, 4, None).unwrap();

        // Pivô 5: menores à esquerda, maiores à direita.
        assert_eq!(pivot_index, 2);
        let data = arr.snapshot();
        let items = data.as_array().unwrap();
        for i in 0..pivot_index as usize {
            assert!(items[i].as_i64().unwrap() <= 5);
        }
        for item in items.iter().skip(pivot_index as usize + 1) {
            assert!(item.as_i64().unwrap() > 5);
        }

        let steps = recorder.steps();
        let swaps = steps.iter().filter(|s| s.step_type == "swap").count();
        assert!(swaps > 0);
        let last = steps.last().unwrap();
        assert_eq!(last.step_type, "partition");
        assert_eq!(last.metadata["pivotIndex"], json!(2));
    }

    #[test]
    fn test_sort_default_and_mixed_types_error() {
        let (arr, recorder) = tracked(vec![json!(5), json!(1), json!(3)]);
        arr.sort().unwrap();
        assert_eq!(arr.snapshot(), json!([1, 3, 5]));
        assert_eq!(recorder.steps().last().unwrap().step_type, "sort");

        let (mixed, _) = tracked(vec![json!(1), json!("a")]);
        assert!(mixed.sort().is_err());
    }

    #[test]
    fn test_splice_and_fill() {
        let (arr, _) = tracked(vec![json!(1), json!(2), json!(3), json!(4)]);
        let removed = arr.splice(1, 2, vec![json!(9)]);
        assert_eq!(removed, vec![json!(2), json!(3)]);
        assert_eq!(arr.snapshot(), json!([1, 9, 4]));

        arr.fill(json!(0), Some(1), None);
        assert_eq!(arr.snapshot(), json!([1, 0, 0]));
    }

    #[test]
    fn test_copy_within() {
        let (arr, _) = tracked(vec![json!(1), json!(2), json!(3), json!(4), json!(5)]);
        arr.copy_within(0, 3, None);
        assert_eq!(arr.snapshot(), json!([4, 5, 3, 4, 5]));
    }

    #[test]
    fn test_snapshot_is_not_aliased() {
        let (arr, _) = tracked(vec![json!(1)]);
        let snap = arr.snapshot();
        arr.push(json!(2));
        assert_eq!(snap, json!([1]));
    }

    #[test]
    fn test_clone_shares_storage() {
        let (arr, _) = tracked(vec![json!(1)]);
        let alias = arr.clone();
        alias.push(json!(2));
        assert_eq!(arr.snapshot(), json!([1, 2]));
    }

    #[test]
    fn test_untracked_array_works_without_steps() {
        let arr = TrackedArray::new(vec![json!(2), json!(1)], None);
        arr.sort().unwrap();
        assert_eq!(arr.snapshot(), json!([1, 2]));
    }

    #[test]
    fn test_engine_registration_roundtrip() {
        let mut engine = Engine::new();
        let recorder = StepRecorder::buffered();
        register(&mut engine, &recorder);

        let result: Array = engine
            .eval(
                r#"
                let a = createTrackedArray([3, 1, 2]);
                a.swap(0, 2);
                a[1] = 9;
                a.getData()
                "#,
            )
            .unwrap();

        let values: Vec<Value> = result.iter().map(dynamic_to_value).collect();
        assert_eq!(values, vec![json!(2), json!(9), json!(3)]);
        // swap + set = dois passos
        assert_eq!(recorder.count(), 2);
    }

    #[test]
    fn test_engine_sort_with_comparator() {
        let mut engine = Engine::new();
        let recorder = StepRecorder::buffered();
        register(&mut engine, &recorder);

        let result: Array = engine
            .eval(
                r#"
                let a = createTrackedArray([5, 2, 8, 1, 9]);
                a.sort(|x, y| x - y);
                a.toArray()
                "#,
            )
            .unwrap();

        let values: Vec<Value> = result.iter().map(dynamic_to_value).collect();
        assert_eq!(
            values,
            vec![json!(1), json!(2), json!(5), json!(8), json!(9)]
        );
        assert_eq!(recorder.steps().last().unwrap().step_type, "sort");
    }

    #[test]
    fn test_engine_length_property() {
        let mut engine = Engine::new();
        let recorder = StepRecorder::buffered();
        register(&mut engine, &recorder);

        let len: i64 = engine
            .eval("let a = createTrackedArray([1, 2, 3]); a.length")
            .unwrap();
        assert_eq!(len, 3);
    }
}
