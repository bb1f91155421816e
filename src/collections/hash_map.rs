//! # TrackedHashMap - Tabela Hash com Encadeamento Separado
//!
//! Capacidade inicial 16, fator de carga 0.75. O hash é multiplicativo
//! e determinístico sobre os bytes da chave, reduzido módulo a
//! capacidade. `set` emite metadata com `hashValue`, `index` do bucket,
//! `collision`, `updated` e (em update) `oldValue`. Quando
//! `size/capacity` cruza o limiar, um `resize` dobra a capacidade e
//! emite o próprio passo com `oldCapacity`/`newCapacity`; o rehash é
//! interno e não emite passos por entrada, preservando a ordem
//! determinística do trace.
//!
//! Buckets vazios são apenas vetores vazios: removida a última entrada,
//! o bucket volta a "ausente".

use std::cell::RefCell;
use std::rc::Rc;

use rhai::{Dynamic, Engine, Map as RhaiMap};
use serde_json::{json, Map, Value};

use super::{dynamic_to_value, meta, value_to_dynamic, StepRecorder};

const TARGET: &str = "hashMap";

/// Capacidade inicial padrão.
pub const DEFAULT_CAPACITY: usize = 16;

/// Fator de carga que dispara o resize.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

// ============================================================================
// TIPO
// ============================================================================

struct HashMapInner {
    buckets: Vec<Vec<(String, Value)>>,
    size: usize,
    threshold: f64,
}

/// Handle compartilhado de uma tabela hash rastreada.
#[derive(Clone)]
pub struct TrackedHashMap {
    inner: Rc<RefCell<HashMapInner>>,
    recorder: Option<StepRecorder>,
}

/// Hash multiplicativo determinístico (acumulador de 32 bits).
fn raw_hash(key: &str) -> u32 {
    let mut hash: u32 = 0;
    for byte in key.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(byte as u32);
    }
    hash
}

impl TrackedHashMap {
    pub fn new(recorder: Option<StepRecorder>) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR, recorder)
    }

    /// Capacidade/limiar customizados (testes de borda usam capacidade
    /// 1 com limiar baixo para forçar resize cedo).
    pub fn with_capacity(capacity: usize, threshold: f64, recorder: Option<StepRecorder>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(HashMapInner {
                buckets: vec![Vec::new(); capacity.max(1)],
                size: 0,
                threshold,
            })),
            recorder,
        }
    }

    /// Carga inicial silenciosa a partir de pares chave/valor.
    pub fn from_entries(entries: Vec<(String, Value)>, recorder: Option<StepRecorder>) -> Self {
        let map = Self::new(recorder);
        for (key, value) in entries {
            map.set_silent(key, value);
        }
        map
    }

    pub fn size(&self) -> usize {
        self.inner.borrow().size
    }

    pub fn capacity(&self) -> usize {
        self.inner.borrow().buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Entradas vivas em ordem de bucket (determinística).
    pub fn entries(&self) -> Vec<(String, Value)> {
        let inner = self.inner.borrow();
        let mut out = Vec::with_capacity(inner.size);
        for bucket in &inner.buckets {
            for (key, value) in bucket {
                out.push((key.clone(), value.clone()));
            }
        }
        out
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries().into_iter().map(|(_, v)| v).collect()
    }

    /// Snapshot como objeto JSON, em ordem de bucket. Não emite passo.
    pub fn snapshot(&self) -> Value {
        let mut object = Map::new();
        for (key, value) in self.entries() {
            object.insert(key, value);
        }
        Value::Object(object)
    }

    fn emit(&self, step_type: &str, args: Vec<Value>, metadata: Map<String, Value>) {
        if let Some(recorder) = &self.recorder {
            recorder.capture(step_type, TARGET, args, self.snapshot(), metadata);
        }
    }

    fn set_silent(&self, key: String, value: Value) -> SetOutcome {
        let outcome = {
            let mut inner = self.inner.borrow_mut();
            let capacity = inner.buckets.len();
            let hash = raw_hash(&key);
            let index = hash as usize % capacity;
            let bucket = &mut inner.buckets[index];
            let collision =
                !bucket.is_empty() && bucket.iter().any(|(existing, _)| existing != &key);

            let old_value = bucket
                .iter_mut()
                .find(|(existing, _)| existing == &key)
                .map(|entry| std::mem::replace(&mut entry.1, value.clone()));

            if old_value.is_none() {
                bucket.push((key.clone(), value.clone()));
                inner.size += 1;
            }

            SetOutcome {
                hash,
                index,
                collision,
                old_value,
            }
        };

        // Resize antes do retorno do set: toda chave existente precisa
        // continuar endereçável na nova capacidade.
        if self.load_factor_exceeded() {
            self.resize();
        }

        outcome
    }

    fn load_factor_exceeded(&self) -> bool {
        let inner = self.inner.borrow();
        inner.size as f64 / inner.buckets.len() as f64 > inner.threshold
    }

    /// Dobra a capacidade e refaz o hash de todas as entradas. O rehash
    /// usa um caminho interno: nenhum passo de `set` visível é
    /// re-emitido, só o passo do próprio `resize`.
    fn resize(&self) {
        let (old_capacity, new_capacity) = {
            let mut inner = self.inner.borrow_mut();
            let old_capacity = inner.buckets.len();
            let new_capacity = old_capacity * 2;

            let old_buckets = std::mem::replace(&mut inner.buckets, vec![Vec::new(); new_capacity]);
            for bucket in old_buckets {
                for (key, value) in bucket {
                    let index = raw_hash(&key) as usize % new_capacity;
                    inner.buckets[index].push((key, value));
                }
            }
            (old_capacity, new_capacity)
        };

        self.emit(
            "resize",
            vec![],
            meta(vec![
                ("oldCapacity", json!(old_capacity)),
                ("newCapacity", json!(new_capacity)),
            ]),
        );
    }

    // ------------------------------------------------------------------
    // Operações instrumentadas
    // ------------------------------------------------------------------

    /// Insere ou atualiza. O passo carrega o hash, o bucket, se houve
    /// colisão e, em update, o valor antigo.
    pub fn set(&self, key: String, value: Value) {
        let outcome = self.set_silent(key.clone(), value.clone());
        let updated = outcome.old_value.is_some();

        let mut metadata = meta(vec![
            ("key", json!(key)),
            ("hashValue", json!(outcome.hash)),
            ("index", json!(outcome.index)),
            ("collision", json!(outcome.collision)),
            ("updated", json!(updated)),
        ]);
        if let Some(old_value) = outcome.old_value {
            metadata.insert("oldValue".to_string(), old_value);
        }

        self.emit("set", vec![json!(key), value], metadata);
    }

    /// Leitura: não emite passo.
    pub fn get(&self, key: &str) -> Option<Value> {
        let inner = self.inner.borrow();
        let index = raw_hash(key) as usize % inner.buckets.len();
        inner.buckets[index]
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
    }

    /// Leitura: não emite passo.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove a chave; o bucket volta a vazio quando esvazia.
    pub fn delete(&self, key: String) -> bool {
        let found = {
            let mut inner = self.inner.borrow_mut();
            let capacity = inner.buckets.len();
            let index = raw_hash(&key) as usize % capacity;
            let bucket = &mut inner.buckets[index];
            let before = bucket.len();
            bucket.retain(|(existing, _)| existing != &key);
            let found = bucket.len() != before;
            if found {
                inner.size -= 1;
            }
            found
        };

        self.emit(
            "delete",
            vec![json!(key)],
            meta(vec![("key", json!(key)), ("found", json!(found))]),
        );
        found
    }

    pub fn clear(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            let capacity = inner.buckets.len();
            inner.buckets = vec![Vec::new(); capacity];
            inner.size = 0;
        }
        self.emit("clear", vec![], meta(vec![]));
    }
}

struct SetOutcome {
    hash: u32,
    index: usize,
    collision: bool,
    old_value: Option<Value>,
}

// ============================================================================
// REGISTRO NO ENGINE
// ============================================================================

/// Chave a partir de um valor da sandbox (números viram texto).
fn map_key(value: &Dynamic) -> String {
    match dynamic_to_value(value) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Registra o tipo, os métodos e os factories de TrackedHashMap.
pub fn register(engine: &mut Engine, recorder: &StepRecorder) {
    engine.register_type_with_name::<TrackedHashMap>("TrackedHashMap");

    engine.register_fn(
        "set",
        |map: &mut TrackedHashMap, key: Dynamic, value: Dynamic| {
            map.set(map_key(&key), dynamic_to_value(&value));
        },
    );
    engine.register_fn("get", |map: &mut TrackedHashMap, key: Dynamic| {
        match map.get(&map_key(&key)) {
            Some(value) => value_to_dynamic(&value),
            None => Dynamic::UNIT,
        }
    });
    engine.register_fn("has", |map: &mut TrackedHashMap, key: Dynamic| {
        map.has(&map_key(&key))
    });
    engine.register_fn("delete", |map: &mut TrackedHashMap, key: Dynamic| {
        map.delete(map_key(&key))
    });
    engine.register_fn("clear", |map: &mut TrackedHashMap| map.clear());
    engine.register_fn("keys", |map: &mut TrackedHashMap| {
        value_to_dynamic(&Value::Array(
            map.keys().into_iter().map(Value::from).collect(),
        ))
    });
    engine.register_fn("values", |map: &mut TrackedHashMap| {
        value_to_dynamic(&Value::Array(map.values()))
    });
    engine.register_fn("entries", |map: &mut TrackedHashMap| {
        let pairs: Vec<Value> = map
            .entries()
            .into_iter()
            .map(|(k, v)| Value::Array(vec![Value::from(k), v]))
            .collect();
        value_to_dynamic(&Value::Array(pairs))
    });
    engine.register_fn("getSize", |map: &mut TrackedHashMap| map.size() as i64);
    engine.register_fn("isEmpty", |map: &mut TrackedHashMap| map.is_empty());
    engine.register_fn("getData", |map: &mut TrackedHashMap| {
        value_to_dynamic(&map.snapshot())
    });

    // Factories.
    let rec = recorder.clone();
    engine.register_fn("createTrackedHashMap", move || {
        TrackedHashMap::new(Some(rec.clone()))
    });
    let rec = recorder.clone();
    engine.register_fn("createTrackedHashMap", move |initial: RhaiMap| {
        let entries: Vec<(String, Value)> = initial
            .iter()
            .map(|(key, value)| (key.to_string(), dynamic_to_value(value)))
            .collect();
        TrackedHashMap::from_entries(entries, Some(rec.clone()))
    });
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked() -> (TrackedHashMap, StepRecorder) {
        let recorder = StepRecorder::buffered();
        (TrackedHashMap::new(Some(recorder.clone())), recorder)
    }

    #[test]
    fn test_set_get_has_roundtrip() {
        let (map, _) = tracked();
        map.set("nome".into(), json!("ada"));
        map.set("idade".into(), json!(36));

        assert_eq!(map.get("nome"), Some(json!("ada")));
        assert!(map.has("idade"));
        assert!(!map.has("email"));
        assert_eq!(map.size(), 2);
    }

    #[test]
    fn test_set_metadata_on_insert_and_update() {
        let (map, recorder) = tracked();
        map.set("k".into(), json!(1));
        map.set("k".into(), json!(2));

        let steps = recorder.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].metadata["updated"], json!(false));
        assert!(steps[0].metadata.get("oldValue").is_none());
        assert!(steps[0].metadata.get("hashValue").is_some());
        assert!(steps[0].metadata.get("index").is_some());

        assert_eq!(steps[1].metadata["updated"], json!(true));
        assert_eq!(steps[1].metadata["oldValue"], json!(1));
        assert_eq!(map.get("k"), Some(json!(2)));
        assert_eq!(map.size(), 1);
    }

    #[test]
    fn test_collision_flag_with_capacity_one() {
        // Capacidade 1 sem resize: tudo colide no mesmo bucket.
        let recorder = StepRecorder::buffered();
        let map = TrackedHashMap::with_capacity(1, 100.0, Some(recorder.clone()));
        map.set("a".into(), json!(1));
        map.set("b".into(), json!(2));

        let steps = recorder.steps();
        assert_eq!(steps[0].metadata["collision"], json!(false));
        assert_eq!(steps[1].metadata["collision"], json!(true));
        assert_eq!(map.get("a"), Some(json!(1)));
        assert_eq!(map.get("b"), Some(json!(2)));
    }

    #[test]
    fn test_resize_doubles_capacity_and_rehashes() {
        // Capacidade 1 com limiar baixo: os dois primeiros inserts
        // causam um passo de resize cada.
        let recorder = StepRecorder::buffered();
        let map = TrackedHashMap::with_capacity(1, 0.75, Some(recorder.clone()));
        map.set("a".into(), json!(1));
        map.set("b".into(), json!(2));

        let steps = recorder.steps();
        let resizes: Vec<_> = steps.iter().filter(|s| s.step_type == "resize").collect();
        assert_eq!(resizes.len(), 2);
        assert_eq!(resizes[0].metadata["oldCapacity"], json!(1));
        assert_eq!(resizes[0].metadata["newCapacity"], json!(2));

        // Todas as chaves seguem endereçáveis após o rehash.
        assert_eq!(map.get("a"), Some(json!(1)));
        assert_eq!(map.get("b"), Some(json!(2)));
        assert_eq!(map.capacity(), 4);
    }

    #[test]
    fn test_load_factor_invariant_after_inserts() {
        let (map, _) = tracked();
        for i in 0..64 {
            map.set(format!("key{}", i), json!(i));
        }
        assert_eq!(map.size(), 64);
        assert!(map.size() as f64 / map.capacity() as f64 <= DEFAULT_LOAD_FACTOR);
        for i in 0..64 {
            assert_eq!(map.get(&format!("key{}", i)), Some(json!(i)));
        }
    }

    #[test]
    fn test_delete_and_bucket_absence() {
        let (map, recorder) = tracked();
        map.set("x".into(), json!(1));
        assert!(map.delete("x".into()));
        assert!(!map.has("x"));
        assert_eq!(map.size(), 0);
        assert!(!map.delete("x".into()));

        let steps = recorder.steps();
        assert_eq!(steps[1].metadata["found"], json!(true));
        assert_eq!(steps[2].metadata["found"], json!(false));
        // Snapshot vazio: bucket voltou a ausente.
        assert_eq!(steps[1].result, json!({}));
    }

    #[test]
    fn test_keys_values_entries_deterministic_and_silent() {
        let (map, recorder) = tracked();
        map.set("a".into(), json!(1));
        map.set("b".into(), json!(2));
        let before = recorder.count();

        let keys_1 = map.keys();
        let keys_2 = map.keys();
        assert_eq!(keys_1, keys_2);
        assert_eq!(map.values().len(), 2);
        assert_eq!(map.entries().len(), 2);
        // Leituras não emitem passos.
        assert_eq!(recorder.count(), before);
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(raw_hash("abc"), raw_hash("abc"));
        assert_ne!(raw_hash("abc"), raw_hash("abd"));
    }

    #[test]
    fn test_clear() {
        let (map, _) = tracked();
        map.set("a".into(), json!(1));
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.snapshot(), json!({}));
    }

    #[test]
    fn test_engine_registration() {
        let mut engine = Engine::new();
        let recorder = StepRecorder::buffered();
        register(&mut engine, &recorder);

        let value: Dynamic = engine
            .eval(
                r#"
                let m = createTrackedHashMap();
                m.set("chave", 42);
                m.get("chave")
                "#,
            )
            .unwrap();
        assert_eq!(dynamic_to_value(&value), json!(42));

        let missing: Dynamic = engine
            .eval(r#"let m = createTrackedHashMap(); m.get("nada")"#)
            .unwrap();
        assert!(missing.is_unit());

        let has: bool = engine
            .eval(r#"let m = createTrackedHashMap(#{"a": 1}); m.has("a")"#)
            .unwrap();
        assert!(has);
    }
}
