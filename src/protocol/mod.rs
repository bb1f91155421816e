//! # Módulo de Protocolo - Estruturas de Dados do Motor
//!
//! Este módulo define todas as **estruturas de dados** que circulam entre
//! o host e a sandbox, e os tipos que o front-end (editor, painéis,
//! visualizadores animados) consome.
//!
//! ## O que trafega no canal host↔sandbox?
//!
//! Um único envelope discriminado pela tag `type`:
//!
//! ```json
//! { "type": "capture-step", "correlationId": "uuid", "step": { ... } }
//! ```
//!
//! Tags permitidas:
//! - `execution-complete` - resultado final + passos + tempo de execução
//! - `execution-error`    - erro não capturado dentro da sandbox
//! - `capture-step`       - um passo de trace capturado
//! - `console-log`        - saída de console interceptada
//! - `test-result`        - reservado para relatório por assertion
//!
//! ## Validação em quatro camadas
//!
//! Toda mensagem recebida passa por quatro camadas, e TODAS precisam
//! passar (mensagem inválida é descartada em silêncio):
//!
//! 1. **Estrutural**: objeto não-nulo com `type` string
//! 2. **Whitelist**: `type` pertence ao conjunto permitido
//! 3. **Schema por tipo**: cada tag valida os campos do payload
//! 4. **Origem**: o `correlationId` precisa ser o da run esperada
//!
//! ## Hierarquia de Tipos:
//!
//! ```text
//! Envelope { correlationId, SandboxMessage }
//! TraceStep (unidade atômica do trace)
//! Challenge (definição declarativa de um problema)
//! TestResult / StepCaptureResult (superfície consumida pela UI)
//! ExecutionReport / ExecutionSummary (relatório da CLI)
//! ```

use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::patterns::PatternId;

// ============================================================================
// PASSO DE TRACE: TRACE STEP
// ============================================================================

/// Um passo capturado: o registro de uma operação instrumentada.
///
/// É a unidade atômica do trace. A UI reproduz a sequência de passos
/// para animar a execução do algoritmo.
///
/// ## Campos:
/// - `step_type`: nome da operação (`push`, `swap`, `partition`, `bfs`, ...)
/// - `target`: tipo de coleção (`array`, `linkedList`, `stack`, ...)
/// - `args`: argumentos da operação, em ordem, serializáveis em JSON
/// - `result`: snapshot pós-operação ou o retorno escalar
/// - `timestamp`: monotônico por run, em ms do relógio da run
/// - `metadata`: dados específicos da operação (`index`, `value`, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStep {
    /// Nome da operação. No JSON é `type` (palavra reservada em Rust).
    #[serde(rename = "type")]
    pub step_type: String,

    /// Tipo de coleção alvo da operação.
    pub target: String,

    /// Argumentos da operação, em ordem.
    #[serde(default)]
    pub args: Vec<Value>,

    /// Snapshot do estado APÓS a operação, ou o retorno escalar.
    #[serde(default)]
    pub result: Value,

    /// Timestamp monotônico da run, em milissegundos.
    #[serde(default)]
    pub timestamp: u64,

    /// Metadados específicos da operação.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl TraceStep {
    /// Cria um passo sem args/result/metadata (preenchidos depois).
    pub fn new(step_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            step_type: step_type.into(),
            target: target.into(),
            args: Vec::new(),
            result: Value::Null,
            timestamp: 0,
            metadata: Map::new(),
        }
    }
}

// ============================================================================
// CONSOLE INTERCEPTADO
// ============================================================================

/// Nível de uma entrada de console interceptada na sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Warn,
    Error,
    Info,
}

/// Uma entrada de console capturada durante a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleEntry {
    /// Nível da mensagem (log, warn, error, info).
    pub level: LogLevel,
    /// Argumentos passados à chamada de console, serializados.
    pub args: Vec<Value>,
}

// ============================================================================
// ENVELOPE DO CANAL HOST↔SANDBOX
// ============================================================================

/// Envelope validado que trafega no canal host↔sandbox.
///
/// Todo envelope que faz parte de uma run carrega `correlationId`:
/// um token opaco cunhado pelo host antes da run. Mensagens com outro
/// ID são descartadas (camada 4 da validação).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// ID de correlação da run que originou a mensagem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Payload discriminado pela tag `type`.
    #[serde(flatten)]
    pub message: SandboxMessage,
}

/// Payload discriminado das mensagens da sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SandboxMessage {
    /// Execução terminou com sucesso.
    #[serde(rename = "execution-complete", rename_all = "camelCase")]
    ExecutionComplete {
        /// Valor do identificador `result` na sandbox (ou null).
        result: Value,
        /// Buffer local de passos acumulado pela sandbox.
        steps: Vec<TraceStep>,
        /// Tempo de execução medido dentro da sandbox, em ms.
        execution_time: u64,
    },

    /// Um erro não capturado interrompeu a execução.
    #[serde(rename = "execution-error", rename_all = "camelCase")]
    ExecutionError {
        /// Mensagem do erro.
        error: String,
        /// Stack trace, quando disponível.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },

    /// Um passo de trace foi capturado.
    #[serde(rename = "capture-step", rename_all = "camelCase")]
    CaptureStep {
        /// O passo capturado.
        step: TraceStep,
    },

    /// Saída de console interceptada.
    #[serde(rename = "console-log", rename_all = "camelCase")]
    ConsoleLog {
        /// Nível da mensagem.
        level: LogLevel,
        /// Argumentos serializados.
        args: Vec<Value>,
    },

    /// Reservado: relatório por assertion individual.
    /// Não é exigido pelo loop principal.
    #[serde(rename = "test-result", rename_all = "camelCase")]
    TestResult {
        test_id: String,
        passed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

// ============================================================================
// VALIDAÇÃO EM QUATRO CAMADAS
// ============================================================================

/// Tags de mensagem aceitas pela camada 2 (whitelist).
pub const ALLOWED_MESSAGE_TYPES: [&str; 5] = [
    "execution-complete",
    "execution-error",
    "capture-step",
    "console-log",
    "test-result",
];

// Schemas da camada 3, um por tag. Compilados uma única vez.
static EXECUTION_COMPLETE_SCHEMA_JSON: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["steps", "executionTime"],
        "properties": {
            "steps": { "type": "array" },
            "executionTime": { "type": "number" }
        }
    })
});

static EXECUTION_ERROR_SCHEMA_JSON: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["error"],
        "properties": {
            "error": { "type": "string" },
            "stack": { "type": "string" }
        }
    })
});

static CAPTURE_STEP_SCHEMA_JSON: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["step"],
        "properties": {
            "step": {
                "type": "object",
                "required": ["type", "target"],
                "properties": {
                    "type": { "type": "string" },
                    "target": { "type": "string" },
                    "args": { "type": "array" }
                }
            }
        }
    })
});

static CONSOLE_LOG_SCHEMA_JSON: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["level", "args"],
        "properties": {
            "level": { "enum": ["log", "warn", "error", "info"] },
            "args": { "type": "array" }
        }
    })
});

static TEST_RESULT_SCHEMA_JSON: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["testId", "passed"],
        "properties": {
            "testId": { "type": "string" },
            "passed": { "type": "boolean" }
        }
    })
});

static EXECUTION_COMPLETE_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::compile(Lazy::force(&EXECUTION_COMPLETE_SCHEMA_JSON)).expect("valid schema")
});
static EXECUTION_ERROR_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::compile(Lazy::force(&EXECUTION_ERROR_SCHEMA_JSON)).expect("valid schema")
});
static CAPTURE_STEP_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::compile(Lazy::force(&CAPTURE_STEP_SCHEMA_JSON)).expect("valid schema")
});
static CONSOLE_LOG_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::compile(Lazy::force(&CONSOLE_LOG_SCHEMA_JSON)).expect("valid schema")
});
static TEST_RESULT_SCHEMA: Lazy<JSONSchema> = Lazy::new(|| {
    JSONSchema::compile(Lazy::force(&TEST_RESULT_SCHEMA_JSON)).expect("valid schema")
});

fn schema_for(message_type: &str) -> Option<&'static JSONSchema> {
    match message_type {
        "execution-complete" => Some(&EXECUTION_COMPLETE_SCHEMA),
        "execution-error" => Some(&EXECUTION_ERROR_SCHEMA),
        "capture-step" => Some(&CAPTURE_STEP_SCHEMA),
        "console-log" => Some(&CONSOLE_LOG_SCHEMA),
        "test-result" => Some(&TEST_RESULT_SCHEMA),
        _ => None,
    }
}

/// Valida uma mensagem crua do canal e a converte em `Envelope`.
///
/// As quatro camadas rodam em ordem; a primeira que falhar descarta a
/// mensagem (retorno `None`). Nada é lançado: mensagem malformada é
/// silenciosamente ignorada, conforme o contrato do canal.
///
/// ## Parâmetros:
/// - `raw`: a mensagem como chegou do canal
/// - `expected_correlation`: quando o host sabe qual run deveria estar
///   emitindo, mensagens de qualquer outra origem são descartadas
pub fn validate_envelope(raw: &Value, expected_correlation: Option<&str>) -> Option<Envelope> {
    // Camada 1: estrutural. Objeto não-nulo com `type` string.
    let obj = raw.as_object()?;
    let message_type = obj.get("type")?.as_str()?;

    // Camada 2: whitelist de tags.
    if !ALLOWED_MESSAGE_TYPES.contains(&message_type) {
        return None;
    }

    // Camada 3: schema por tipo.
    let schema = schema_for(message_type)?;
    if !schema.is_valid(raw) {
        return None;
    }

    // Camada 4: origem. Se o host sabe qual run deveria emitir,
    // qualquer outra origem (ID diferente ou ausente) é descartada.
    if let Some(expected) = expected_correlation {
        match obj.get("correlationId").and_then(Value::as_str) {
            Some(id) if id == expected => {}
            _ => return None,
        }
    }

    serde_json::from_value(raw.clone()).ok()
}

// ============================================================================
// DESAFIO: CHALLENGE
// ============================================================================

/// Dificuldade de um desafio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(format!(
                "Dificuldade '{}' inválida. Use: easy, medium, hard",
                other
            )),
        }
    }
}

/// Gate de padrão algorítmico avaliado antes da execução.
///
/// Se presente no desafio e nenhum detector de `any_of` casar com a
/// submissão, a run é rejeitada com `error_message` sem subir sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternRequirement {
    /// Basta UM destes padrões estar presente.
    pub any_of: Vec<PatternId>,
    /// Mensagem exibida ao usuário quando nenhum padrão casa.
    pub error_message: String,
}

/// Registro declarativo de um problema.
///
/// O motor trata o conteúdo como dado opaco: `assertions` é texto-fonte
/// avaliado dentro da sandbox, `reference_solution` serve apenas para
/// inferir o nome do entry point.
///
/// O prefixo do `id` codifica a família de coleção:
/// `{collection-family}-{operation}-{difficulty}`, com famílias
/// `array | linkedlist | stack | queue | binarytree | tree | graph |
/// hashmap | stackqueue`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    /// Identificador único; o prefixo seleciona o bundle de coleções.
    pub id: String,

    /// Dificuldade do desafio.
    pub difficulty: Difficulty,

    /// Dado inicial passado ao entry point (serializável).
    /// Para grafos: objeto `{vertices, edges, directed}`.
    #[serde(default)]
    pub initial_data: Value,

    /// Argumentos extras, em ordem (possivelmente vazio).
    #[serde(default)]
    pub additional_args: Vec<Value>,

    /// Saída esperada. Opaca ao motor: quem valida é o snippet de
    /// assertions.
    #[serde(default)]
    pub expected_output: Value,

    /// Texto-fonte de uma ou mais assertions. O identificador `result`
    /// refere-se ao retorno da função do usuário; `steps` e
    /// `finalResult` também são visíveis.
    pub assertions: String,

    /// Solução de referência; usada para derivar o nome do entry point.
    #[serde(default)]
    pub reference_solution: String,

    /// Esqueleto mostrado ao usuário no editor. Opaco ao motor.
    #[serde(default)]
    pub skeleton_code: String,

    /// Dicas progressivas. Opacas ao motor.
    #[serde(default)]
    pub hints: Vec<String>,

    /// Critérios de aceite exibidos na UI. Opacos ao motor.
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,

    /// Nome explícito do entry point. Quando presente, dispensa a
    /// inferência sobre a solução de referência.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,

    /// Gate de padrões algorítmicos (opcional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_requirement: Option<PatternRequirement>,
}

// ============================================================================
// RESULTADOS CONSUMIDOS PELA UI
// ============================================================================

/// Resultado de um teste (uma submissão contra um desafio).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// ID do desafio testado.
    pub test_id: String,

    /// Se a submissão passou em todas as assertions.
    pub passed: bool,

    /// Mensagem de erro (parse, runtime, assertion, timeout, gate).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Tempo de execução em milissegundos.
    pub execution_time: u64,

    /// Passos capturados, em ordem de emissão. Mesmo em falha, os
    /// passos parciais são retornados para a UI animar o progresso.
    pub steps: Vec<TraceStep>,

    /// Console interceptado durante a run.
    pub console_logs: Vec<ConsoleEntry>,
}

/// Resultado do pipeline de captura de passos (C6).
///
/// Usado para rodar soluções de referência e gerar saídas esperadas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCaptureResult {
    /// Se a execução terminou sem erro.
    pub success: bool,

    /// Valor do identificador `result` na sandbox.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Mensagem de erro quando `success == false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Passos capturados, em ordem de emissão.
    pub steps: Vec<TraceStep>,

    /// Tempo de execução em milissegundos.
    pub execution_time: u64,

    /// Console interceptado.
    pub console_logs: Vec<ConsoleEntry>,
}

impl StepCaptureResult {
    /// Resultado de falha antes de executar (instrumentação falhou).
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            steps: Vec::new(),
            execution_time: 0,
            console_logs: Vec::new(),
        }
    }
}

// ============================================================================
// RELATÓRIO DE EXECUÇÃO (CLI)
// ============================================================================

/// Relatório final de uma execução da CLI.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// UUID único desta execução.
    pub execution_id: String,

    /// Status geral: "passed" se todos passaram, "failed" se algum falhou.
    pub status: String,

    /// Data/hora de início em formato ISO8601.
    pub start_time: String,

    /// Data/hora de fim em formato ISO8601.
    pub end_time: String,

    /// Resumo estatístico da execução.
    pub summary: ExecutionSummary,

    /// Resultado de cada desafio executado.
    pub results: Vec<TestResult>,
}

/// Resumo estatístico da execução.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    /// Total de desafios executados.
    pub total_tests: usize,

    /// Quantos passaram.
    pub passed: usize,

    /// Quantos falharam.
    pub failed: usize,

    /// Total de passos capturados em todas as runs.
    pub total_steps: usize,

    /// Duração total em milissegundos.
    pub duration_ms: u64,
}

impl ExecutionSummary {
    /// Cria um summary a partir dos resultados.
    pub fn from_results(results: &[TestResult], duration_ms: u64) -> Self {
        let passed = results.iter().filter(|r| r.passed).count();
        let failed = results.len() - passed;
        let total_steps = results.iter().map(|r| r.steps.len()).sum();

        Self {
            total_tests: results.len(),
            passed,
            failed,
            total_steps,
            duration_ms,
        }
    }
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_step_raw(correlation: &str) -> Value {
        json!({
            "type": "capture-step",
            "correlationId": correlation,
            "step": {
                "type": "push",
                "target": "stack",
                "args": [5],
                "result": [5],
                "timestamp": 3
            }
        })
    }

    #[test]
    fn test_validate_envelope_accepts_valid_capture_step() {
        let raw = capture_step_raw("run-1");
        let envelope = validate_envelope(&raw, Some("run-1")).expect("valid envelope");

        match envelope.message {
            SandboxMessage::CaptureStep { step } => {
                assert_eq!(step.step_type, "push");
                assert_eq!(step.target, "stack");
                assert_eq!(step.args, vec![json!(5)]);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_validate_envelope_drops_non_object() {
        assert!(validate_envelope(&json!("capture-step"), None).is_none());
        assert!(validate_envelope(&json!(null), None).is_none());
        assert!(validate_envelope(&json!([1, 2]), None).is_none());
    }

    #[test]
    fn test_validate_envelope_drops_unknown_type() {
        let raw = json!({ "type": "drop-database", "step": {} });
        assert!(validate_envelope(&raw, None).is_none());
    }

    #[test]
    fn test_validate_envelope_drops_schema_mismatch() {
        // capture-step sem campo step
        let raw = json!({ "type": "capture-step", "correlationId": "run-1" });
        assert!(validate_envelope(&raw, Some("run-1")).is_none());

        // step sem type string
        let raw = json!({
            "type": "capture-step",
            "correlationId": "run-1",
            "step": { "type": 42, "target": "stack" }
        });
        assert!(validate_envelope(&raw, Some("run-1")).is_none());
    }

    #[test]
    fn test_validate_envelope_drops_foreign_correlation() {
        // Mensagem da run A nunca afeta a run B.
        let raw = capture_step_raw("run-a");
        assert!(validate_envelope(&raw, Some("run-b")).is_none());

        // Sem correlationId quando o host espera um: descartada.
        let raw = json!({
            "type": "capture-step",
            "step": { "type": "push", "target": "stack" }
        });
        assert!(validate_envelope(&raw, Some("run-b")).is_none());
    }

    #[test]
    fn test_validate_envelope_without_expectation_skips_source_check() {
        let raw = capture_step_raw("whoever");
        assert!(validate_envelope(&raw, None).is_some());
    }

    #[test]
    fn test_trace_step_wire_format() {
        let mut step = TraceStep::new("swap", "array");
        step.args = vec![json!(0), json!(2)];
        step.result = json!([1, 2, 3]);
        step.timestamp = 17;

        let raw = serde_json::to_value(&step).unwrap();
        assert_eq!(raw["type"], "swap");
        assert_eq!(raw["target"], "array");
        assert_eq!(raw["timestamp"], 17);
        // metadata vazio não aparece no JSON
        assert!(raw.get("metadata").is_none());
    }

    #[test]
    fn test_execution_complete_wire_format() {
        let envelope = Envelope {
            correlation_id: Some("run-9".to_string()),
            message: SandboxMessage::ExecutionComplete {
                result: json!([1, 2, 3]),
                steps: vec![],
                execution_time: 42,
            },
        };

        let raw = serde_json::to_value(&envelope).unwrap();
        assert_eq!(raw["type"], "execution-complete");
        assert_eq!(raw["correlationId"], "run-9");
        assert_eq!(raw["executionTime"], 42);
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!("easy".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert_eq!("Medium".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_challenge_deserializes_camel_case() {
        let challenge: Challenge = serde_json::from_value(json!({
            "id": "array-sort-easy",
            "difficulty": "easy",
            "initialData": [5, 2, 8, 1, 9],
            "additionalArgs": [],
            "expectedOutput": [1, 2, 5, 8, 9],
            "assertions": "expect(result).toEqual([1, 2, 5, 8, 9]);",
            "referenceSolution": "fn sort(arr) { arr.sort(); arr }"
        }))
        .unwrap();

        assert_eq!(challenge.id, "array-sort-easy");
        assert_eq!(challenge.difficulty, Difficulty::Easy);
        assert_eq!(challenge.initial_data, json!([5, 2, 8, 1, 9]));
        assert!(challenge.pattern_requirement.is_none());
    }

    #[test]
    fn test_summary_from_results() {
        let ok = TestResult {
            test_id: "a".into(),
            passed: true,
            error: None,
            execution_time: 10,
            steps: vec![TraceStep::new("push", "stack")],
            console_logs: vec![],
        };
        let bad = TestResult {
            test_id: "b".into(),
            passed: false,
            error: Some("boom".into()),
            execution_time: 5,
            steps: vec![],
            console_logs: vec![],
        };

        let summary = ExecutionSummary::from_results(&[ok, bad], 15);
        assert_eq!(summary.total_tests, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_steps, 1);
        assert_eq!(summary.duration_ms, 15);
    }
}
