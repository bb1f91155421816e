//! # Módulo de Assertions - Superfície Fluente na Sandbox
//!
//! `expect(valor)` devolve uma `Expectation` com os matchers que os
//! snippets de assertion dos desafios usam. Nada de framework de teste
//! dentro da sandbox: cada matcher lança um erro descritivo na falha,
//! que segue o caminho normal de `execution-error`.
//!
//! Igualdade profunda (`toEqual`) compara JSON canonicalizado: floats
//! sem parte fracionária viram inteiros antes da comparação, então
//! `2 + 1.0` é igual a `3`. Coleções rastreadas comparam pelo
//! snapshot.
//!
//! O conjunto de matchers é o contrato completo; estender é mudança
//! compatível. O ramo `not` cobre toBe, toEqual, toContain, toBeTruthy
//! e toBeNull (e nega os demais por tabela, sem custo extra).

use rhai::{Dynamic, Engine, EvalAltResult, FnPtr, NativeCallContext};
use serde_json::Value;

use crate::collections::dynamic_to_value;

// ============================================================================
// CANONICALIZAÇÃO
// ============================================================================

/// Normaliza números: float com fração zero vira inteiro, recursivo.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if n.as_i64().is_none() && f.fract() == 0.0 && f.is_finite() {
                    if f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                        return Value::from(f as i64);
                    }
                }
            }
            Value::Number(n)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Valor canônico de um Dynamic da sandbox.
fn canonical(value: &Dynamic) -> Value {
    canonicalize(dynamic_to_value(value))
}

fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "<unserializable>".to_string())
}

// ============================================================================
// EXPECTATION
// ============================================================================

/// Valor sob verificação, com o ramo `not` opcional.
#[derive(Clone)]
pub struct Expectation {
    actual: Dynamic,
    negated: bool,
}

impl Expectation {
    fn new(actual: Dynamic) -> Self {
        Self {
            actual,
            negated: false,
        }
    }

    fn negate(&self) -> Self {
        Self {
            actual: self.actual.clone(),
            negated: !self.negated,
        }
    }

    /// Aplica a negação e monta a mensagem de falha.
    fn verify(&self, passed: bool, description: &str) -> Result<(), Box<EvalAltResult>> {
        let ok = if self.negated { !passed } else { passed };
        if ok {
            return Ok(());
        }
        let actual = render(&canonical(&self.actual));
        let message = if self.negated {
            format!("Expected {} not {}", actual, description)
        } else {
            format!("Expected {} {}", actual, description)
        };
        Err(message.into())
    }

    fn number(&self) -> Result<f64, Box<EvalAltResult>> {
        canonical(&self.actual).as_f64().ok_or_else(|| {
            format!(
                "Expected a number, got {}",
                render(&canonical(&self.actual))
            )
            .into()
        })
    }

    fn is_truthy(&self) -> bool {
        match canonical(&self.actual) {
            Value::Null => false,
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

// ============================================================================
// REGISTRO NO ENGINE
// ============================================================================

/// Registra `expect` e todos os matchers no engine da run.
pub fn register(engine: &mut Engine) {
    engine.register_type_with_name::<Expectation>("Expectation");

    engine.register_fn("expect", |value: Dynamic| Expectation::new(value));
    engine.register_get("not", |e: &mut Expectation| e.negate());

    // --- Igualdade ---------------------------------------------------
    engine.register_fn(
        "toBe",
        |e: &mut Expectation, expected: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let expected = canonicalize(dynamic_to_value(&expected));
            let passed = canonical(&e.actual) == expected;
            e.verify(passed, &format!("to be {}", render(&expected)))
        },
    );
    engine.register_fn(
        "toEqual",
        |e: &mut Expectation, expected: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let expected = canonicalize(dynamic_to_value(&expected));
            let passed = canonical(&e.actual) == expected;
            e.verify(passed, &format!("to equal {}", render(&expected)))
        },
    );
    engine.register_fn(
        "toStrictEqual",
        |e: &mut Expectation, expected: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let expected = canonicalize(dynamic_to_value(&expected));
            let passed = canonical(&e.actual) == expected;
            e.verify(passed, &format!("to strictly equal {}", render(&expected)))
        },
    );

    // --- Comparações numéricas ---------------------------------------
    engine.register_fn(
        "toBeGreaterThan",
        |e: &mut Expectation, expected: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let expected = dynamic_to_value(&expected)
                .as_f64()
                .ok_or_else(|| "toBeGreaterThan expects a number".to_string())?;
            let passed = e.number()? > expected;
            e.verify(passed, &format!("to be greater than {}", expected))
        },
    );
    engine.register_fn(
        "toBeGreaterThanOrEqual",
        |e: &mut Expectation, expected: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let expected = dynamic_to_value(&expected)
                .as_f64()
                .ok_or_else(|| "toBeGreaterThanOrEqual expects a number".to_string())?;
            let passed = e.number()? >= expected;
            e.verify(passed, &format!("to be greater than or equal {}", expected))
        },
    );
    engine.register_fn(
        "toBeLessThan",
        |e: &mut Expectation, expected: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let expected = dynamic_to_value(&expected)
                .as_f64()
                .ok_or_else(|| "toBeLessThan expects a number".to_string())?;
            let passed = e.number()? < expected;
            e.verify(passed, &format!("to be less than {}", expected))
        },
    );
    engine.register_fn(
        "toBeLessThanOrEqual",
        |e: &mut Expectation, expected: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let expected = dynamic_to_value(&expected)
                .as_f64()
                .ok_or_else(|| "toBeLessThanOrEqual expects a number".to_string())?;
            let passed = e.number()? <= expected;
            e.verify(passed, &format!("to be less than or equal {}", expected))
        },
    );

    // --- Conteúdo e tamanho ------------------------------------------
    engine.register_fn(
        "toContain",
        |e: &mut Expectation, expected: Dynamic| -> Result<(), Box<EvalAltResult>> {
            let needle = canonicalize(dynamic_to_value(&expected));
            let haystack = canonical(&e.actual);
            let passed = match (&haystack, &needle) {
                (Value::Array(items), _) => items.contains(&needle),
                (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
                _ => false,
            };
            e.verify(passed, &format!("to contain {}", render(&needle)))
        },
    );
    engine.register_fn(
        "toHaveLength",
        |e: &mut Expectation, expected: i64| -> Result<(), Box<EvalAltResult>> {
            let length = match canonical(&e.actual) {
                Value::Array(items) => Some(items.len() as i64),
                Value::String(s) => Some(s.chars().count() as i64),
                _ => None,
            };
            match length {
                Some(length) => e.verify(
                    length == expected,
                    &format!("to have length {} (was {})", expected, length),
                ),
                None => Err(format!(
                    "toHaveLength expects an array or string, got {}",
                    render(&canonical(&e.actual))
                )
                .into()),
            }
        },
    );

    // --- Truthiness e presença ---------------------------------------
    engine.register_fn(
        "toBeTruthy",
        |e: &mut Expectation| -> Result<(), Box<EvalAltResult>> {
            let passed = e.is_truthy();
            e.verify(passed, "to be truthy")
        },
    );
    engine.register_fn(
        "toBeFalsy",
        |e: &mut Expectation| -> Result<(), Box<EvalAltResult>> {
            let passed = !e.is_truthy();
            e.verify(passed, "to be falsy")
        },
    );
    engine.register_fn(
        "toBeNull",
        |e: &mut Expectation| -> Result<(), Box<EvalAltResult>> {
            let passed = e.actual.is_unit();
            e.verify(passed, "to be null")
        },
    );
    engine.register_fn(
        "toBeUndefined",
        |e: &mut Expectation| -> Result<(), Box<EvalAltResult>> {
            let passed = e.actual.is_unit();
            e.verify(passed, "to be undefined")
        },
    );
    engine.register_fn(
        "toBeDefined",
        |e: &mut Expectation| -> Result<(), Box<EvalAltResult>> {
            let passed = !e.actual.is_unit();
            e.verify(passed, "to be defined")
        },
    );
    engine.register_fn(
        "toBeInstanceOf",
        |e: &mut Expectation, type_name: &str| -> Result<(), Box<EvalAltResult>> {
            let actual_type = e.actual.type_name();
            let passed = actual_type == type_name || actual_type.ends_with(type_name);
            e.verify(passed, &format!("to be an instance of {}", type_name))
        },
    );

    // --- toThrow ------------------------------------------------------
    engine.register_fn(
        "toThrow",
        |ctx: NativeCallContext, e: &mut Expectation| -> Result<(), Box<EvalAltResult>> {
            let outcome = call_throwable(&ctx, e)?;
            let passed = outcome.is_some();
            e.verify(passed, "to throw")
        },
    );
    engine.register_fn(
        "toThrow",
        |ctx: NativeCallContext,
         e: &mut Expectation,
         fragment: &str|
         -> Result<(), Box<EvalAltResult>> {
            let outcome = call_throwable(&ctx, e)?;
            match outcome {
                Some(message) => e.verify(
                    message.contains(fragment),
                    &format!(
                        "to throw an error containing {:?} (threw {:?})",
                        fragment, message
                    ),
                ),
                None => e.verify(false, &format!("to throw an error containing {:?}", fragment)),
            }
        },
    );
}

/// Chama o valor (que precisa ser função) e devolve a mensagem do erro
/// lançado, se houve.
fn call_throwable(
    ctx: &NativeCallContext,
    e: &Expectation,
) -> Result<Option<String>, Box<EvalAltResult>> {
    let fn_ptr = e
        .actual
        .clone()
        .try_cast::<FnPtr>()
        .ok_or_else(|| "toThrow expects a function".to_string())?;
    let outcome: Result<Dynamic, _> = fn_ptr.call_within_context(ctx, ());
    Ok(outcome.err().map(|error| error.to_string()))
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        register(&mut engine);
        engine
    }

    fn passes(script: &str) -> bool {
        engine().eval::<Dynamic>(script).is_ok()
    }

    fn failure_message(script: &str) -> String {
        engine().eval::<Dynamic>(script).unwrap_err().to_string()
    }

    #[test]
    fn test_to_be_and_to_equal() {
        assert!(passes("expect(5).toBe(5)"));
        assert!(passes("expect([1, 2, 3]).toEqual([1, 2, 3])"));
        assert!(passes("expect(#{a: 1}).toEqual(#{a: 1})"));
        assert!(!passes("expect(5).toBe(6)"));
        assert!(passes("expect([1, 2]).toStrictEqual([1, 2])"));
    }

    #[test]
    fn test_canonical_equality_bridges_ints_and_floats() {
        // 2 + 1.0 = 3.0; canonicalizado, é igual a 3.
        assert!(passes("expect(2 + 1.0).toEqual(3)"));
        assert!(passes("expect([1.0, 2.0]).toEqual([1, 2])"));
        assert!(!passes("expect(2.5).toEqual(2)"));
    }

    #[test]
    fn test_failure_message_is_descriptive() {
        let message = failure_message("expect(5).toBe(6)");
        assert!(message.contains("Expected 5 to be 6"));
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(passes("expect(5).toBeGreaterThan(4)"));
        assert!(passes("expect(5).toBeGreaterThanOrEqual(5)"));
        assert!(passes("expect(3).toBeLessThan(4)"));
        assert!(passes("expect(3).toBeLessThanOrEqual(3)"));
        assert!(!passes("expect(3).toBeGreaterThan(3)"));
        assert!(!passes(r#"expect("texto").toBeGreaterThan(1)"#));
    }

    #[test]
    fn test_contain_and_length() {
        assert!(passes("expect([1, 2, 3]).toContain(2)"));
        assert!(!passes("expect([1, 2, 3]).toContain(9)"));
        assert!(passes(r#"expect("abcdef").toContain("cde")"#));
        assert!(passes("expect([1, 2, 3]).toHaveLength(3)"));
        assert!(passes(r#"expect("abc").toHaveLength(3)"#));
        assert!(!passes("expect([1]).toHaveLength(2)"));
    }

    #[test]
    fn test_truthiness_and_presence() {
        assert!(passes("expect(1).toBeTruthy()"));
        assert!(passes("expect(0).toBeFalsy()"));
        assert!(passes(r#"expect("").toBeFalsy()"#));
        assert!(passes("expect(()).toBeNull()"));
        assert!(passes("expect(()).toBeUndefined()"));
        assert!(passes("expect(42).toBeDefined()"));
        assert!(!passes("expect(()).toBeDefined()"));
    }

    #[test]
    fn test_not_branch() {
        assert!(passes("expect(5).not.toBe(6)"));
        assert!(!passes("expect(5).not.toBe(5)"));
        assert!(passes("expect([1]).not.toEqual([2])"));
        assert!(passes("expect([1]).not.toContain(9)"));
        assert!(passes("expect(0).not.toBeTruthy()"));
        assert!(passes("expect(1).not.toBeNull()"));

        let message = failure_message("expect(5).not.toBe(5)");
        assert!(message.contains("not to be 5"));
    }

    #[test]
    fn test_to_throw() {
        assert!(passes(r#"expect(|| throw "boom").toThrow()"#));
        assert!(passes(r#"expect(|| throw "boom happened").toThrow("boom")"#));
        assert!(!passes(r#"expect(|| 1 + 1).toThrow()"#));
        assert!(!passes(r#"expect(|| throw "other").toThrow("boom")"#));
        assert!(!passes("expect(42).toThrow()"));
    }

    #[test]
    fn test_to_be_instance_of() {
        assert!(passes(r#"expect("texto").toBeInstanceOf("string")"#));
    }

    #[test]
    fn test_matchers_against_tracked_snapshot() {
        use crate::collections::{array, StepRecorder};

        let mut engine = Engine::new();
        register(&mut engine);
        let recorder = StepRecorder::buffered();
        array::register(&mut engine, &recorder);

        // Uma coleção rastreada compara pelo snapshot dela.
        let result: Result<Dynamic, _> = engine.eval(
            r#"
            let a = createTrackedArray([2, 1]);
            a.sort();
            expect(a).toEqual([1, 2])
            "#,
        );
        assert!(result.is_ok());
    }
}
