//! # Pipeline de Captura de Passos
//!
//! Orquestra instrumentar → executar → agregar:
//!
//! 1. Instrumenta o fonte com captura legada DESLIGADA (as coleções
//!    rastreadas emitem os passos) e error boundary LIGADO.
//! 2. Falha de instrumentação vira `StepCaptureResult` falho sem subir
//!    sandbox.
//! 3. Entrega o fonte ao host com um handler que roteia `capture-step`
//!    para o buffer ordenado (disparando `on_step`) e `console-log`
//!    para o buffer paralelo (disparando `on_console`).
//! 4. Resolve com sucesso/erro derivado da mensagem terminal ou do
//!    timeout.
//!
//! A forma batch roda várias fontes em paralelo pelo batch do host,
//! preservando os índices para os callbacks por amostra.

use std::sync::Arc;

use tracing::debug;

use crate::collections::CollectionFamily;
use crate::instrument::{instrument, InstrumentOptions};
use crate::limits::{validate_limits, ExecutionLimits};
use crate::protocol::{ConsoleEntry, StepCaptureResult, TraceStep};
use crate::sandbox::{ExecutionRequest, RunCallbacks, RunOutcome, SandboxHost};

// ============================================================================
// REQUISIÇÃO
// ============================================================================

/// Uma captura de passos a executar.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Fonte cru (ainda não instrumentado).
    pub code: String,
    /// Limites da run.
    pub limits: ExecutionLimits,
    /// Bundles a registrar. Default: todos (runs de referência podem
    /// usar qualquer coleção).
    pub families: Vec<CollectionFamily>,
    /// Se o console deve ser agregado.
    pub capture_logs: bool,
}

impl CaptureRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            limits: ExecutionLimits::default(),
            families: CollectionFamily::ALL.to_vec(),
            capture_logs: true,
        }
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }
}

// ============================================================================
// CAPTURA ÚNICA
// ============================================================================

/// Executa o pipeline completo para um fonte.
pub async fn capture_steps(request: CaptureRequest, callbacks: RunCallbacks) -> StepCaptureResult {
    // Limites pré-execução (tamanho da fonte).
    let limit_check = validate_limits(request.code.len(), &request.limits);
    if !limit_check.passed {
        let message = limit_check
            .violations
            .first()
            .map(|v| v.message.clone())
            .unwrap_or_else(|| "Submission exceeds execution limits".to_string());
        return StepCaptureResult::failed(message);
    }

    // Instrumentação: captura legada desligada, boundary ligado.
    let options = InstrumentOptions {
        max_loop_iterations: request.limits.max_loop_iterations,
        max_recursion_depth: request.limits.max_recursion_depth,
        capture_operations: false,
        add_error_boundaries: true,
    };
    let instrumented = instrument(&request.code, &options);
    if let Some(error) = instrumented.error {
        debug!(error = %error, "Instrumentation failed; skipping sandbox");
        return StepCaptureResult::failed(error);
    }

    let execution = ExecutionRequest {
        code: instrumented.code,
        limits: request.limits,
        families: request.families,
        capture_logs: request.capture_logs,
    };

    let outcome = SandboxHost::new().execute(execution, callbacks).await;
    outcome_to_result(outcome)
}

/// Converte o desfecho do host no resultado da superfície pública.
fn outcome_to_result(outcome: RunOutcome) -> StepCaptureResult {
    StepCaptureResult {
        success: outcome.success,
        result: if outcome.success {
            Some(outcome.result)
        } else {
            None
        },
        error: outcome.error,
        steps: outcome.steps,
        execution_time: outcome.execution_time,
        console_logs: outcome.console_logs,
    }
}

// ============================================================================
// CAPTURA EM LOTE
// ============================================================================

/// Callbacks por amostra do batch, indexados pela posição da fonte.
#[derive(Clone, Default)]
pub struct BatchCallbacks {
    pub on_step: Option<Arc<dyn Fn(usize, &TraceStep) + Send + Sync>>,
    pub on_console: Option<Arc<dyn Fn(usize, &ConsoleEntry) + Send + Sync>>,
}

/// Roda uma sequência de fontes em paralelo pelo batch do host,
/// preservando os índices.
pub async fn capture_steps_batch(
    codes: Vec<String>,
    limits: ExecutionLimits,
    callbacks: BatchCallbacks,
) -> Vec<StepCaptureResult> {
    let options = InstrumentOptions {
        max_loop_iterations: limits.max_loop_iterations,
        max_recursion_depth: limits.max_recursion_depth,
        capture_operations: false,
        add_error_boundaries: true,
    };

    // Instrumenta tudo primeiro; falhas não vão para a sandbox mas
    // mantêm a posição no resultado.
    let mut results: Vec<Option<StepCaptureResult>> = Vec::with_capacity(codes.len());
    let mut runnable: Vec<(usize, ExecutionRequest, RunCallbacks)> = Vec::new();

    for (index, code) in codes.into_iter().enumerate() {
        let instrumented = instrument(&code, &options);
        match instrumented.error {
            Some(error) => results.push(Some(StepCaptureResult::failed(error))),
            None => {
                results.push(None);
                let run_callbacks = RunCallbacks {
                    on_step: callbacks.on_step.clone().map(|callback| {
                        Arc::new(move |step: &TraceStep| callback(index, step))
                            as Arc<dyn Fn(&TraceStep) + Send + Sync>
                    }),
                    on_console: callbacks.on_console.clone().map(|callback| {
                        Arc::new(move |entry: &ConsoleEntry| callback(index, entry))
                            as Arc<dyn Fn(&ConsoleEntry) + Send + Sync>
                    }),
                };
                runnable.push((
                    index,
                    ExecutionRequest {
                        code: instrumented.code,
                        limits: limits.clone(),
                        families: CollectionFamily::ALL.to_vec(),
                        capture_logs: true,
                    },
                    run_callbacks,
                ));
            }
        }
    }

    let max_parallel = limits.max_parallel_runs;
    let indices: Vec<usize> = runnable.iter().map(|(index, _, _)| *index).collect();
    let items: Vec<(ExecutionRequest, RunCallbacks)> = runnable
        .into_iter()
        .map(|(_, request, callbacks)| (request, callbacks))
        .collect();

    let outcomes = SandboxHost::new().execute_batch(items, max_parallel).await;
    for (index, outcome) in indices.into_iter().zip(outcomes) {
        results[index] = Some(outcome_to_result(outcome));
    }

    results
        .into_iter()
        .map(|result| result.unwrap_or_else(|| StepCaptureResult::failed("Missing batch result")))
        .collect()
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_capture_steps_success() {
        let request = CaptureRequest::new(
            r#"
            let a = createTrackedArray([3, 1, 2]);
            a.sort();
            let result = a.getData();
            "#,
        )
        .with_limits(ExecutionLimits::strict());

        let result = capture_steps(request, RunCallbacks::default()).await;

        assert!(result.success);
        assert_eq!(result.result, Some(json!([1, 2, 3])));
        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.steps[0].step_type, "sort");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_capture_steps_instrumentation_failure_short_circuits() {
        let request = CaptureRequest::new("fn broken( {").with_limits(ExecutionLimits::strict());
        let result = capture_steps(request, RunCallbacks::default()).await;

        assert!(!result.success);
        assert!(result.error.is_some());
        assert!(result.steps.is_empty());
        assert_eq!(result.execution_time, 0);
    }

    #[tokio::test]
    async fn test_capture_steps_empty_source_fails_limits() {
        let request = CaptureRequest::new("").with_limits(ExecutionLimits::strict());
        let result = capture_steps(request, RunCallbacks::default()).await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("empty"));
    }

    #[tokio::test]
    async fn test_capture_steps_infinite_loop_guarded() {
        let request =
            CaptureRequest::new("while true { }").with_limits(ExecutionLimits::strict());
        let result = capture_steps(request, RunCallbacks::default()).await;

        assert!(!result.success);
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("Infinite loop detected"));
    }

    #[tokio::test]
    async fn test_batch_preserves_indices_and_callbacks() {
        use std::sync::Mutex;

        let seen: Arc<Mutex<Vec<(usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callbacks = BatchCallbacks {
            on_step: Some(Arc::new(move |index, step: &TraceStep| {
                sink.lock().unwrap().push((index, step.step_type.clone()));
            })),
            on_console: None,
        };

        let codes = vec![
            "let s = createTrackedStack(); s.push(1); let result = 1;".to_string(),
            "fn broken( {".to_string(),
            "let q = createTrackedQueue(); q.enqueue(2); let result = 2;".to_string(),
        ];

        let results = capture_steps_batch(codes, ExecutionLimits::strict(), callbacks).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].success);
        assert!(!results[1].success); // falha de instrumentação no lugar certo
        assert!(results[2].success);
        assert_eq!(results[0].result, Some(json!(1)));
        assert_eq!(results[2].result, Some(json!(2)));

        let events = seen.lock().unwrap();
        assert!(events.contains(&(0, "push".to_string())));
        assert!(events.contains(&(2, "enqueue".to_string())));
    }
}
