//! # Módulo da Sandbox - Host de Execução Isolada
//!
//! Cada run ganha um contexto próprio: um engine de script recém
//! construído (ver [`engine`]) rodando numa thread dedicada, sem
//! nenhuma capacidade de alcançar estado do host além do canal de
//! mensagens validado.
//!
//! ## Ciclo de vida de uma run
//!
//! 1. O host cunha um `correlationId` e abre o canal.
//! 2. A thread da sandbox avalia o fonte; `capture`, console e erros
//!    viram envelopes no canal, todos carimbados com o ID.
//! 3. O host agrega `capture-step`/`console-log` em ordem de chegada
//!    (que é a ordem de emissão) e encerra na primeira mensagem
//!    terminal (`execution-complete`/`execution-error`).
//! 4. No estouro do timeout de parede o host marca a flag de
//!    cancelamento, falha a run e derruba o contexto. Mensagens
//!    atrasadas morrem com o canal.
//!
//! Todo caminho terminal solta o canal e derruba a sandbox; vazamento
//! de recurso em caminho de erro é defeito.
//!
//! ## Batch
//!
//! `execute_batch` dispara N runs concorrentes sob um semáforo (padrão
//! do executor paralelo com JoinSet), cada uma com contexto e
//! correlação próprios.

pub mod engine;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rhai::{Dynamic, Scope};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::collections::{dynamic_to_value, CollectionFamily};
use crate::limits::ExecutionLimits;
use crate::protocol::{
    validate_envelope, ConsoleEntry, Envelope, LogLevel, SandboxMessage, TraceStep,
};

/// Pilha generosa para a thread da sandbox: a avaliação do script é
/// recursiva no host e o teto de recursão padrão é 1000 chamadas.
const SANDBOX_STACK_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// REQUISIÇÃO, CALLBACKS E DESFECHO
// ============================================================================

/// Uma execução a ser feita na sandbox.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Fonte já instrumentado.
    pub code: String,
    /// Limites da run (timeout, loops, recursão).
    pub limits: ExecutionLimits,
    /// Bundles de coleção a registrar no engine.
    pub families: Vec<CollectionFamily>,
    /// Se o console interceptado deve ser agregado.
    pub capture_logs: bool,
}

/// Callbacks por evento, invocados na ordem de chegada das mensagens.
#[derive(Clone, Default)]
pub struct RunCallbacks {
    pub on_step: Option<Arc<dyn Fn(&TraceStep) + Send + Sync>>,
    pub on_console: Option<Arc<dyn Fn(&ConsoleEntry) + Send + Sync>>,
}

/// Desfecho de uma run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Terminou com `execution-complete`.
    pub success: bool,
    /// Valor do identificador `result` na sandbox (null se indefinido).
    pub result: Value,
    /// Erro terminal (runtime, assertion, timeout...).
    pub error: Option<String>,
    /// Passos agregados em ordem de emissão (parciais em caso de erro).
    pub steps: Vec<TraceStep>,
    /// Console agregado.
    pub console_logs: Vec<ConsoleEntry>,
    /// Tempo de execução em ms.
    pub execution_time: u64,
    /// A run foi abandonada por timeout de parede.
    pub timed_out: bool,
}

impl RunOutcome {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Value::Null,
            error: Some(error.into()),
            steps: Vec::new(),
            console_logs: Vec::new(),
            execution_time: 0,
            timed_out: false,
        }
    }
}

// ============================================================================
// EMISSOR DE MENSAGENS (LADO SANDBOX)
// ============================================================================

/// Posta envelopes serializados no canal, carimbados com o
/// `correlationId` da run. Envios após o host soltar o canal são
/// descartados em silêncio (a run já morreu).
#[derive(Clone)]
pub struct MessageEmitter {
    tx: UnboundedSender<Value>,
    correlation_id: String,
}

impl MessageEmitter {
    pub fn new(tx: UnboundedSender<Value>, correlation_id: impl Into<String>) -> Self {
        Self {
            tx,
            correlation_id: correlation_id.into(),
        }
    }

    fn post(&self, message: SandboxMessage) {
        let envelope = Envelope {
            correlation_id: Some(self.correlation_id.clone()),
            message,
        };
        if let Ok(raw) = serde_json::to_value(&envelope) {
            let _ = self.tx.send(raw);
        }
    }

    pub fn post_step(&self, step: &TraceStep) {
        self.post(SandboxMessage::CaptureStep { step: step.clone() });
    }

    pub fn post_console(&self, level: LogLevel, args: Vec<Value>) {
        self.post(SandboxMessage::ConsoleLog { level, args });
    }

    pub fn post_complete(&self, result: Value, steps: Vec<TraceStep>, execution_time: u64) {
        self.post(SandboxMessage::ExecutionComplete {
            result,
            steps,
            execution_time,
        });
    }

    pub fn post_error(&self, error: String, stack: Option<String>) {
        self.post(SandboxMessage::ExecutionError { error, stack });
    }
}

// ============================================================================
// HOST
// ============================================================================

/// Host das sandboxes. Sem estado: cada run é um contexto novo.
pub struct SandboxHost;

impl SandboxHost {
    pub fn new() -> Self {
        Self
    }

    /// Executa uma run do começo ao fim (com timeout e teardown).
    pub async fn execute(&self, request: ExecutionRequest, callbacks: RunCallbacks) -> RunOutcome {
        run_one(request, callbacks).await
    }

    /// Dispara N runs concorrentes (cada uma com sandbox e correlação
    /// próprias) e espera todas, preservando os índices.
    pub async fn execute_batch(
        &self,
        items: Vec<(ExecutionRequest, RunCallbacks)>,
        max_parallel: usize,
    ) -> Vec<RunOutcome> {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
        let mut join_set = JoinSet::new();

        for (index, (request, callbacks)) in items.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                (index, run_one(request, callbacks).await)
            });
        }

        let mut results: Vec<Option<RunOutcome>> = (0..total).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => results[index] = Some(outcome),
                Err(join_error) => error!(error = %join_error, "Sandbox batch task panicked"),
            }
        }

        results
            .into_iter()
            .map(|outcome| outcome.unwrap_or_else(|| RunOutcome::failed("Sandbox task failed")))
            .collect()
    }
}

impl Default for SandboxHost {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// UMA RUN
// ============================================================================

enum Terminal {
    Complete { result: Value, execution_time: u64 },
    Error(String),
    ChannelClosed,
}

async fn run_one(request: ExecutionRequest, callbacks: RunCallbacks) -> RunOutcome {
    let correlation_id = Uuid::new_v4().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let cancel = Arc::new(AtomicBool::new(false));
    let start = Instant::now();
    let timeout = request.limits.timeout;
    let capture_logs = request.capture_logs;

    debug!(correlation_id = %correlation_id, "Sandbox run starting");

    // Thread dedicada com pilha maior: a avaliação do script recursa
    // no host até o teto de chamadas configurado.
    let spawned = {
        let correlation_id = correlation_id.clone();
        let cancel = Arc::clone(&cancel);
        std::thread::Builder::new()
            .name(format!("sandbox-{}", &correlation_id[..8]))
            .stack_size(SANDBOX_STACK_BYTES)
            .spawn(move || script_thread(request, tx, cancel, correlation_id))
    };
    if let Err(spawn_error) = spawned {
        error!(error = %spawn_error, "Failed to spawn sandbox thread");
        return RunOutcome::failed(format!("Failed to start sandbox: {}", spawn_error));
    }

    let mut steps: Vec<TraceStep> = Vec::new();
    let mut console_logs: Vec<ConsoleEntry> = Vec::new();

    // Loop do host: valida, agrega e para na primeira terminal.
    let outcome = tokio::time::timeout(timeout, async {
        while let Some(raw) = rx.recv().await {
            let envelope = match validate_envelope(&raw, Some(&correlation_id)) {
                Some(envelope) => envelope,
                None => continue, // malformada ou de outra run: descartada
            };

            match envelope.message {
                SandboxMessage::CaptureStep { step } => {
                    if let Some(on_step) = &callbacks.on_step {
                        on_step(&step);
                    }
                    steps.push(step);
                }
                SandboxMessage::ConsoleLog { level, args } => {
                    if capture_logs {
                        let entry = ConsoleEntry { level, args };
                        if let Some(on_console) = &callbacks.on_console {
                            on_console(&entry);
                        }
                        console_logs.push(entry);
                    }
                }
                SandboxMessage::ExecutionComplete {
                    result,
                    execution_time,
                    ..
                } => {
                    return Terminal::Complete {
                        result,
                        execution_time,
                    };
                }
                SandboxMessage::ExecutionError { error, .. } => {
                    return Terminal::Error(error);
                }
                // Reservada para relatório por assertion; fora do loop
                // principal.
                SandboxMessage::TestResult { .. } => {}
            }
        }
        Terminal::ChannelClosed
    })
    .await;

    let elapsed = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(Terminal::Complete {
            result,
            execution_time,
        }) => {
            info!(
                correlation_id = %correlation_id,
                steps = steps.len(),
                execution_time_ms = execution_time,
                "Sandbox run completed"
            );
            RunOutcome {
                success: true,
                result,
                error: None,
                steps,
                console_logs,
                execution_time,
                timed_out: false,
            }
        }
        Ok(Terminal::Error(message)) => {
            info!(correlation_id = %correlation_id, error = %message, "Sandbox run failed");
            RunOutcome {
                success: false,
                result: Value::Null,
                error: Some(message),
                steps,
                console_logs,
                execution_time: elapsed,
                timed_out: false,
            }
        }
        Ok(Terminal::ChannelClosed) => {
            error!(correlation_id = %correlation_id, "Sandbox channel closed without terminal message");
            RunOutcome {
                success: false,
                result: Value::Null,
                error: Some("Sandbox channel closed unexpectedly".to_string()),
                steps,
                console_logs,
                execution_time: elapsed,
                timed_out: false,
            }
        }
        Err(_) => {
            // Timeout de parede: derruba a sandbox e abandona a run.
            // Os passos parciais ainda voltam para a UI.
            cancel.store(true, Ordering::Relaxed);
            warn!(
                correlation_id = %correlation_id,
                timeout_ms = timeout.as_millis() as u64,
                "Sandbox run timed out"
            );
            RunOutcome {
                success: false,
                result: Value::Null,
                error: Some(format!(
                    "Execution timed out after {} ms",
                    timeout.as_millis()
                )),
                steps,
                console_logs,
                execution_time: elapsed,
                timed_out: true,
            }
        }
    }
    // `rx` morre aqui em todos os caminhos: mensagens atrasadas com o
    // correlationId desta run não têm mais para onde ir.
}

/// Corpo da thread da sandbox: monta o engine, avalia, posta terminal.
fn script_thread(
    request: ExecutionRequest,
    tx: UnboundedSender<Value>,
    cancel: Arc<AtomicBool>,
    correlation_id: String,
) {
    let emitter = MessageEmitter::new(tx, correlation_id);
    // Backstop com folga: o timeout do host decide primeiro; o
    // deadline interno só garante que a thread morre mesmo sem host.
    let deadline = Instant::now() + request.limits.timeout + std::time::Duration::from_millis(250);
    let parts = engine::build_engine(
        &request.limits,
        &request.families,
        emitter.clone(),
        cancel,
        deadline,
    );

    let mut scope = Scope::new();
    let start = Instant::now();

    match parts
        .engine
        .eval_with_scope::<Dynamic>(&mut scope, &request.code)
    {
        Ok(_) => {
            // Preferência: o slot do boundary; sem boundary, o
            // identificador `result` do escopo raiz; senão, null.
            let captured = parts.captured.borrow_mut().take();
            let result = match captured {
                Some((result, _final_result)) => result,
                None => scope
                    .get_value::<Dynamic>("result")
                    .map(|value| dynamic_to_value(&value))
                    .unwrap_or(Value::Null),
            };
            emitter.post_complete(
                result,
                parts.recorder.steps(),
                start.elapsed().as_millis() as u64,
            );
        }
        Err(eval_error) => {
            emitter.post_error(engine::render_eval_error(&eval_error), None);
        }
    }
}

// ============================================================================
// SUPORTE DE TESTE
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// Emissor ligado a um receiver de teste.
    pub(crate) fn collecting_emitter(
        correlation_id: &str,
    ) -> (MessageEmitter, UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (MessageEmitter::new(tx, correlation_id), rx)
    }
}

// ============================================================================
// TESTES
// ============================================================================
