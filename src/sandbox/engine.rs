//! # Construção do Engine da Sandbox
//!
//! Monta o engine de script de uma run: sem nenhuma capacidade
//! ambiente (arquivo, rede, relógio do host), só o que é registrado
//! explicitamente aqui:
//!
//! - `capture(...)` nas duas formas aceitas (5 posicionais ou um mapa)
//! - módulo `console` interceptado + hooks de print/debug
//! - `__reportError`, `__loop_guard`, `__capture_result`,
//!   `__captured_steps`, `__unwrap` e as variantes rastreadas do hook
//!   legado
//! - o shim de assertions e os bundles de coleção da run
//!
//! Os tetos de recurso seguem o modelo de fuel de uma sandbox wasm:
//! profundidade de chamadas limitada pelo engine, orçamento de loop
//! pelos guards, e o hook de progresso observa o deadline e a flag de
//! cancelamento do host para derrubar o script.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rhai::{Array, Dynamic, Engine, EvalAltResult, Map as RhaiMap, Module};
use serde_json::Value;

use crate::collections::{
    array::TrackedArray, dynamic_to_value, register_bundles, value_to_dynamic, CollectionFamily,
    StepRecorder,
};
use crate::limits::ExecutionLimits;
use crate::protocol::{LogLevel, TraceStep};
use crate::sandbox::MessageEmitter;

/// A cada quantas operações o hook de progresso consulta o relógio.
const PROGRESS_CHECK_MASK: u64 = 0x3FF;

// ============================================================================
// PARTES DA SANDBOX
// ============================================================================

/// Engine montado + estado observável pelo runner da run.
pub struct EngineParts {
    pub engine: Engine,
    pub recorder: StepRecorder,
    /// Slot preenchido por `__capture_result` (o error boundary fecha
    /// `result`/`finalResult` num bloco; variáveis de bloco não
    /// sobrevivem ao eval, então o script entrega os valores por aqui).
    pub captured: Rc<RefCell<Option<(Value, Value)>>>,
}

/// Monta o engine de uma run.
pub fn build_engine(
    limits: &ExecutionLimits,
    families: &[CollectionFamily],
    emitter: MessageEmitter,
    cancel: Arc<AtomicBool>,
    deadline: Instant,
) -> EngineParts {
    let mut engine = Engine::new();

    // Teto de profundidade de chamadas: é a guarda de recursão da run.
    engine.set_max_call_levels(limits.max_recursion_depth);

    // Deadline observado de dentro do script, além do timeout do host:
    // mesmo sem host vivo a run para sozinha.
    {
        let cancel = Arc::clone(&cancel);
        engine.on_progress(move |ops| {
            if ops & PROGRESS_CHECK_MASK == 0 {
                if cancel.load(Ordering::Relaxed) {
                    return Some("Execution cancelled by host timeout".into());
                }
                if Instant::now() > deadline {
                    return Some("Execution timed out".into());
                }
            }
            None
        });
    }

    // Gravador de passos da run: buffer local + envelope capture-step.
    let recorder = {
        let emitter = emitter.clone();
        StepRecorder::new(move |step| emitter.post_step(step))
    };

    // Guards de loop injetados pelo instrumentador: um contador por
    // loop, teto compartilhado.
    {
        let counters: Rc<RefCell<HashMap<i64, u64>>> = Rc::new(RefCell::new(HashMap::new()));
        let max_iterations = limits.max_loop_iterations;
        engine.register_fn(
            "__loop_guard",
            move |id: i64| -> Result<(), Box<EvalAltResult>> {
                let mut counters = counters.borrow_mut();
                let count = counters.entry(id).or_insert(0);
                *count += 1;
                if *count > max_iterations {
                    return Err(format!(
                        "Infinite loop detected: loop exceeded {} iterations",
                        max_iterations
                    )
                    .into());
                }
                Ok(())
            },
        );
    }

    // capture(...) - forma posicional com 5 argumentos.
    {
        let recorder = recorder.clone();
        engine.register_fn(
            "capture",
            move |operation: &str, target: &str, args: Array, result: Dynamic, metadata: RhaiMap| {
                let mut step = TraceStep::new(operation, target);
                step.args = args.iter().map(dynamic_to_value).collect();
                step.result = dynamic_to_value(&result);
                step.metadata = rhai_map_to_metadata(&metadata);
                recorder.record(step);
            },
        );
    }

    // capture(...) - forma de objeto único {type|operation, target, ...}.
    {
        let recorder = recorder.clone();
        engine.register_fn("capture", move |raw: RhaiMap| {
            let operation = raw
                .get("type")
                .or_else(|| raw.get("operation"))
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            let target = raw
                .get("target")
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unknown".to_string());

            let mut step = TraceStep::new(operation, target);
            if let Some(args) = raw.get("args").and_then(|d| d.clone().try_cast::<Array>()) {
                step.args = args.iter().map(dynamic_to_value).collect();
            }
            if let Some(result) = raw.get("result") {
                step.result = dynamic_to_value(result);
            }
            if let Some(metadata) = raw
                .get("metadata")
                .and_then(|d| d.clone().try_cast::<RhaiMap>())
            {
                step.metadata = rhai_map_to_metadata(&metadata);
            }
            recorder.record(step);
        });
    }

    // Console interceptado: console::log/warn/error/info.
    {
        let mut console = Module::new();
        for (name, level) in [
            ("log", LogLevel::Log),
            ("warn", LogLevel::Warn),
            ("error", LogLevel::Error),
            ("info", LogLevel::Info),
        ] {
            let single = emitter.clone();
            console.set_native_fn(name, move |value: Dynamic| {
                single.post_console(level, vec![dynamic_to_value(&value)]);
                Ok(Dynamic::UNIT)
            });
            let double = emitter.clone();
            console.set_native_fn(name, move |a: Dynamic, b: Dynamic| {
                double.post_console(level, vec![dynamic_to_value(&a), dynamic_to_value(&b)]);
                Ok(Dynamic::UNIT)
            });
        }
        engine.register_static_module("console", console.into());
    }

    // print/debug nativos também caem no canal de console.
    {
        let print_emitter = emitter.clone();
        engine.on_print(move |text| {
            print_emitter.post_console(LogLevel::Log, vec![Value::String(text.to_string())]);
        });
        let debug_emitter = emitter.clone();
        engine.on_debug(move |text, _source, _pos| {
            debug_emitter.post_console(LogLevel::Info, vec![Value::String(text.to_string())]);
        });
    }

    // Repórter usado pelo error boundary do instrumentador.
    {
        let emitter = emitter.clone();
        engine.register_fn("__reportError", move |error: Dynamic| {
            emitter.post_error(render_thrown(&error), None);
        });
    }

    // Slot de resultado preenchido pelo fim do bloco instrumentado.
    let captured: Rc<RefCell<Option<(Value, Value)>>> = Rc::new(RefCell::new(None));
    {
        let captured = Rc::clone(&captured);
        engine.register_fn(
            "__capture_result",
            move |result: Dynamic, final_result: Dynamic| {
                *captured.borrow_mut() =
                    Some((dynamic_to_value(&result), dynamic_to_value(&final_result)));
            },
        );
    }

    // Buffer de passos visível para os snippets de assertion (`steps`).
    {
        let recorder = recorder.clone();
        engine.register_fn("__captured_steps", move || -> Dynamic {
            let steps = recorder.steps();
            rhai::serde::to_dynamic(&steps).unwrap_or_else(|_| Dynamic::from(Array::new()))
        });
    }

    // Desembrulha coleções rastreadas para o `finalResult` do harness.
    engine.register_fn("__unwrap", |value: Dynamic| -> Dynamic {
        if value.is_unit() {
            return value;
        }
        let snapshot = dynamic_to_value(&value);
        match value_is_tracked(&value) {
            true => value_to_dynamic(&snapshot),
            false => value,
        }
    });

    // Hook legado de captura rasa: push/pop rastreados sobre arrays
    // comuns. Sobre coleções rastreadas apenas delega (os passos já
    // saem da coleção; nada de captura dupla).
    {
        let recorder = recorder.clone();
        engine.register_fn(
            "__traced_push",
            move |array: &mut Array, value: Dynamic| -> i64 {
                array.push(value.clone());
                let snapshot = Value::Array(array.iter().map(dynamic_to_value).collect());
                recorder.capture(
                    "push",
                    "array",
                    vec![dynamic_to_value(&value)],
                    snapshot,
                    serde_json::Map::new(),
                );
                array.len() as i64
            },
        );
    }
    {
        let recorder = recorder.clone();
        engine.register_fn("__traced_pop", move |array: &mut Array| -> Dynamic {
            let removed = array.pop().unwrap_or(Dynamic::UNIT);
            let snapshot = Value::Array(array.iter().map(dynamic_to_value).collect());
            recorder.capture(
                "pop",
                "array",
                vec![],
                snapshot,
                serde_json::Map::new(),
            );
            removed
        });
    }
    engine.register_fn("__traced_push", |array: &mut TrackedArray, value: Dynamic| {
        array.push(dynamic_to_value(&value))
    });
    engine.register_fn("__traced_pop", |array: &mut TrackedArray| -> Dynamic {
        let removed = array.pop();
        value_to_dynamic(&removed)
    });

    // Shim de assertions e bundles da run.
    crate::assertions::register(&mut engine);
    register_bundles(&mut engine, families, &recorder);

    EngineParts {
        engine,
        recorder,
        captured,
    }
}

/// True se o valor é uma coleção rastreada registrada.
fn value_is_tracked(value: &Dynamic) -> bool {
    value.type_name().starts_with("Tracked")
        || value
            .type_name()
            .rsplit("::")
            .next()
            .map(|n| n.starts_with("Tracked"))
            .unwrap_or(false)
}

fn rhai_map_to_metadata(map: &RhaiMap) -> serde_json::Map<String, Value> {
    let mut metadata = serde_json::Map::new();
    for (key, value) in map {
        metadata.insert(key.to_string(), dynamic_to_value(value));
    }
    metadata
}

/// Mensagem de um valor lançado com `throw`.
fn render_thrown(value: &Dynamic) -> String {
    match dynamic_to_value(value) {
        Value::String(message) => message,
        other => other.to_string(),
    }
}

// ============================================================================
// TRADUÇÃO DE ERROS DO ENGINE
// ============================================================================

/// Traduz um erro de avaliação para a mensagem voltada ao usuário.
///
/// Os limites do engine viram as mensagens documentadas; o restante
/// preserva a mensagem original (posição inclusa).
pub fn render_eval_error(error: &EvalAltResult) -> String {
    match error {
        EvalAltResult::ErrorStackOverflow(_) => "Maximum recursion depth exceeded".to_string(),
        EvalAltResult::ErrorTerminated(token, _) => render_thrown(token),
        EvalAltResult::ErrorRuntime(value, _) => render_thrown(value),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => render_eval_error(inner),
        other => other.to_string(),
    }
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::test_support::collecting_emitter;
    use serde_json::json;

    fn strict_parts(families: &[CollectionFamily]) -> EngineParts {
        let (emitter, _rx) = collecting_emitter("test-run");
        let cancel = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        build_engine(
            &ExecutionLimits::strict(),
            families,
            emitter,
            cancel,
            deadline,
        )
    }

    #[test]
    fn test_capture_positional_form() {
        let parts = strict_parts(&[]);
        parts
            .engine
            .run(r#"capture("push", "stack", [5], [5], #{index: 0});"#)
            .unwrap();

        let steps = parts.recorder.steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_type, "push");
        assert_eq!(steps[0].target, "stack");
        assert_eq!(steps[0].args, vec![json!(5)]);
        assert_eq!(steps[0].metadata["index"], json!(0));
    }

    #[test]
    fn test_capture_object_form_accepts_type_or_operation() {
        let parts = strict_parts(&[]);
        parts
            .engine
            .run(
                r#"
                capture(#{type: "swap", target: "array", args: [0, 1], result: [2, 1]});
                capture(#{operation: "pop", target: "stack"});
                "#,
            )
            .unwrap();

        let steps = parts.recorder.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_type, "swap");
        assert_eq!(steps[0].result, json!([2, 1]));
        assert_eq!(steps[1].step_type, "pop");
    }

    #[test]
    fn test_loop_guard_throws_documented_message() {
        let parts = strict_parts(&[]);
        // Limite strict: 10_000 iterações.
        let error = parts
            .engine
            .run("let i = 0; while true { __loop_guard(0); i += 1; }")
            .unwrap_err();
        assert!(error.to_string().contains("Infinite loop detected"));
    }

    #[test]
    fn test_each_loop_has_independent_counter() {
        let parts = strict_parts(&[]);
        // Dois loops de 6_000 iterações cada: nenhum estoura o teto de
        // 10_000 porque os contadores são independentes.
        parts
            .engine
            .run(
                r#"
                let i = 0;
                while i < 6000 { __loop_guard(0); i += 1; }
                let j = 0;
                while j < 6000 { __loop_guard(1); j += 1; }
                "#,
            )
            .unwrap();
    }

    #[test]
    fn test_recursion_cap_renders_documented_message() {
        let parts = strict_parts(&[]);
        let error = parts
            .engine
            .run("fn f(n) { f(n + 1) } f(0);")
            .unwrap_err();
        assert_eq!(render_eval_error(&error), "Maximum recursion depth exceeded");
    }

    #[test]
    fn test_runtime_error_rendering_unwraps_function_calls() {
        let parts = strict_parts(&[]);
        let error = parts.engine.run(r#"throw "boom";"#).unwrap_err();
        assert_eq!(render_eval_error(&error), "boom");
    }

    #[test]
    fn test_capture_result_slot() {
        let parts = strict_parts(&[]);
        parts
            .engine
            .run("__capture_result(41 + 1, [1, 2]);")
            .unwrap();
        let captured = parts.captured.borrow_mut().take().unwrap();
        assert_eq!(captured.0, json!(42));
        assert_eq!(captured.1, json!([1, 2]));
    }

    #[test]
    fn test_captured_steps_visible_in_script() {
        let parts = strict_parts(&[CollectionFamily::Array]);
        let swaps: i64 = parts
            .engine
            .eval(
                r#"
                let a = createTrackedArray([3, 2, 1]);
                a.swap(0, 2);
                let steps = __captured_steps();
                steps.filter(|s| s["type"] == "swap").len()
                "#,
            )
            .unwrap();
        assert_eq!(swaps, 1);
    }

    #[test]
    fn test_unwrap_tracked_collection() {
        let parts = strict_parts(&[CollectionFamily::Array]);
        let unwrapped: Array = parts
            .engine
            .eval("__unwrap(createTrackedArray([1, 2]))")
            .unwrap();
        let values: Vec<Value> = unwrapped.iter().map(dynamic_to_value).collect();
        assert_eq!(values, vec![json!(1), json!(2)]);

        // Valores comuns passam intactos.
        let passthrough: i64 = parts.engine.eval("__unwrap(7)").unwrap();
        assert_eq!(passthrough, 7);
    }

    #[test]
    fn test_traced_push_on_plain_array_captures() {
        let parts = strict_parts(&[]);
        parts
            .engine
            .run("let a = []; __traced_push(a, 5); __traced_pop(a);")
            .unwrap();
        let steps = parts.recorder.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_type, "push");
        assert_eq!(steps[1].step_type, "pop");
    }

    #[test]
    fn test_deadline_terminates_unguarded_loop() {
        let (emitter, _rx) = collecting_emitter("test-run");
        let cancel = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + std::time::Duration::from_millis(100);
        let parts = build_engine(
            &ExecutionLimits::strict(),
            &[],
            emitter,
            cancel,
            deadline,
        );

        // Sem guard de loop; o deadline do hook de progresso derruba.
        let error = parts.engine.run("loop { }").unwrap_err();
        assert!(render_eval_error(&error).contains("timed out"));
    }

    #[test]
    fn test_cancel_flag_terminates_script() {
        let (emitter, _rx) = collecting_emitter("test-run");
        let cancel = Arc::new(AtomicBool::new(true)); // já cancelado
        let deadline = Instant::now() + std::time::Duration::from_secs(60);
        let parts = build_engine(
            &ExecutionLimits::strict(),
            &[],
            emitter,
            cancel,
            deadline,
        );

        let error = parts.engine.run("loop { }").unwrap_err();
        assert!(render_eval_error(&error).contains("cancelled"));
    }
}
