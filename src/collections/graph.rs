//! # TrackedGraph - Grafo por Lista de Adjacência Instrumentado
//!
//! Grafo parametrizado por `directed`. Arestas não-direcionadas são
//! espelhadas na inserção. `bfs`/`dfs` emitem um passo por vértice
//! visitado carregando a fronteira/frente de recursão do momento;
//! `hasCycle` escolhe o algoritmo certo por direção (pilha de recursão
//! para dirigidos, DFS com pai para não-dirigidos) e emite um passo
//! terminal. `shortestPath` é BFS não-ponderado e, como leitura, não
//! emite passos.
//!
//! A lista de adjacência é ordenada por chave e os vizinhos mantêm a
//! ordem de inserção: travessias são determinísticas.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine};
use serde_json::{json, Value};

use super::{dynamic_to_value, meta, value_to_dynamic, StepRecorder};

const TARGET: &str = "graph";

// ============================================================================
// TIPO
// ============================================================================

#[derive(Clone)]
struct Edge {
    to: String,
    weight: Option<f64>,
}

struct GraphInner {
    directed: bool,
    adjacency: BTreeMap<String, Vec<Edge>>,
}

/// Handle compartilhado de um grafo rastreado.
#[derive(Clone)]
pub struct TrackedGraph {
    inner: Rc<RefCell<GraphInner>>,
    recorder: Option<StepRecorder>,
}

impl TrackedGraph {
    pub fn new(directed: bool, recorder: Option<StepRecorder>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(GraphInner {
                directed,
                adjacency: BTreeMap::new(),
            })),
            recorder,
        }
    }

    /// Constrói a partir de vértices + arestas, em silêncio (o trace
    /// começa nas operações do usuário). Arestas aceitam `[from, to]`,
    /// `[from, to, weight]` ou `{from, to, weight?}`.
    pub fn from_parts(
        vertices: Vec<String>,
        edges: Vec<(String, String, Option<f64>)>,
        directed: bool,
        recorder: Option<StepRecorder>,
    ) -> Self {
        let graph = Self::new(directed, recorder);
        {
            let mut inner = graph.inner.borrow_mut();
            for vertex in vertices {
                inner.adjacency.entry(vertex).or_default();
            }
            for (from, to, weight) in edges {
                inner.adjacency.entry(from.clone()).or_default();
                inner.adjacency.entry(to.clone()).or_default();
                inner.adjacency.get_mut(&from).expect("inserted above").push(Edge {
                    to: to.clone(),
                    weight,
                });
                if !directed && from != to {
                    inner.adjacency.get_mut(&to).expect("inserted above").push(Edge {
                        to: from,
                        weight,
                    });
                }
            }
        }
        graph
    }

    pub fn is_directed(&self) -> bool {
        self.inner.borrow().directed
    }

    pub fn size(&self) -> usize {
        self.inner.borrow().adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn vertices(&self) -> Vec<String> {
        self.inner.borrow().adjacency.keys().cloned().collect()
    }

    pub fn neighbors(&self, vertex: &str) -> Vec<String> {
        self.inner
            .borrow()
            .adjacency
            .get(vertex)
            .map(|edges| edges.iter().map(|e| e.to.clone()).collect())
            .unwrap_or_default()
    }

    /// Arestas do grafo; num grafo não-dirigido cada par espelhado
    /// aparece uma única vez.
    pub fn edges(&self) -> Vec<(String, String, Option<f64>)> {
        let inner = self.inner.borrow();
        let mut result = Vec::new();
        let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
        for (from, edges) in &inner.adjacency {
            for edge in edges {
                if inner.directed {
                    result.push((from.clone(), edge.to.clone(), edge.weight));
                } else {
                    let key = if *from <= edge.to {
                        (from.clone(), edge.to.clone())
                    } else {
                        (edge.to.clone(), from.clone())
                    };
                    if seen.insert(key) {
                        result.push((from.clone(), edge.to.clone(), edge.weight));
                    }
                }
            }
        }
        result
    }

    /// Snapshot `{vertices, edges, directed}`. Não emite passo.
    pub fn snapshot(&self) -> Value {
        let edges: Vec<Value> = self
            .edges()
            .into_iter()
            .map(|(from, to, weight)| {
                json!({
                    "from": from,
                    "to": to,
                    "weight": weight,
                })
            })
            .collect();
        json!({
            "vertices": self.vertices(),
            "edges": edges,
            "directed": self.is_directed(),
        })
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

    // ------------------------------------------------------------------
    // Mutações
    // ------------------------------------------------------------------

    pub fn add_vertex(&self, vertex: String) {
        let added = {
            let mut inner = self.inner.borrow_mut();
            match inner.adjacency.entry(vertex.clone()) {
                std::collections::btree_map::Entry::Vacant(entry) => {
                    entry.insert(Vec::new());
                    true
                }
                std::collections::btree_map::Entry::Occupied(_) => false,
            }
        };
        self.emit(
            "addVertex",
            vec![json!(vertex)],
            meta(vec![("vertex", json!(vertex)), ("added", json!(added))]),
        );
    }

    /// Adiciona uma aresta; vértices ausentes são criados. O override
    /// `directed` vale só para esta aresta.
    pub fn add_edge(
        &self,
        from: String,
        to: String,
        weight: Option<f64>,
        directed_override: Option<bool>,
    ) {
        let mirrored = {
            let mut inner = self.inner.borrow_mut();
            let directed = directed_override.unwrap_or(inner.directed);
            inner.adjacency.entry(from.clone()).or_default();
            inner.adjacency.entry(to.clone()).or_default();
            inner
                .adjacency
                .get_mut(&from)
                .expect("inserted above")
                .push(Edge {
                    to: to.clone(),
                    weight,
                });
            let mirrored = !directed && from != to;
            if mirrored {
                inner
                    .adjacency
                    .get_mut(&to)
                    .expect("inserted above")
                    .push(Edge {
                        to: from.clone(),
                        weight,
                    });
            }
            mirrored
        };

        self.emit(
            "addEdge",
            vec![json!(from), json!(to), json!(weight)],
            meta(vec![
                ("from", json!(from)),
                ("to", json!(to)),
                ("weight", json!(weight)),
                ("mirrored", json!(mirrored)),
            ]),
        );
    }

    /// Remove o vértice e todas as arestas que o tocam (cascata).
    pub fn remove_vertex(&self, vertex: String) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let removed = inner.adjacency.remove(&vertex).is_some();
            if removed {
                for edges in inner.adjacency.values_mut() {
                    edges.retain(|e| e.to != vertex);
                }
            }
            removed
        };
        self.emit(
            "removeVertex",
            vec![json!(vertex)],
            meta(vec![("vertex", json!(vertex)), ("removed", json!(removed))]),
        );
        removed
    }

    pub fn remove_edge(&self, from: String, to: String) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let directed = inner.directed;
            let mut removed = false;
            if let Some(edges) = inner.adjacency.get_mut(&from) {
                let before = edges.len();
                edges.retain(|e| e.to != to);
                removed = edges.len() != before;
            }
            if !directed {
                if let Some(edges) = inner.adjacency.get_mut(&to) {
                    edges.retain(|e| e.to != from);
                }
            }
            removed
        };
        self.emit(
            "removeEdge",
            vec![json!(from), json!(to)],
            meta(vec![
                ("from", json!(from)),
                ("to", json!(to)),
                ("removed", json!(removed)),
            ]),
        );
        removed
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().adjacency.clear();
        self.emit("clear", vec![], meta(vec![]));
    }

    // ------------------------------------------------------------------
    // Travessias
    // ------------------------------------------------------------------

    /// Busca em largura; um passo por vértice visitado, carregando a
    /// fronteira (conteúdo da fila) daquele momento.
    pub fn bfs(&self, start: String) -> Vec<String> {
        let mut visited_order = Vec::new();
        if !self.inner.borrow().adjacency.contains_key(&start) {
            return visited_order;
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        visited.insert(start.clone());
        queue.push_back(start.clone());

        while let Some(vertex) = queue.pop_front() {
            visited_order.push(vertex.clone());
            for neighbor in self.neighbors(&vertex) {
                if visited.insert(neighbor.clone()) {
                    queue.push_back(neighbor);
                }
            }
            let frontier: Vec<String> = queue.iter().cloned().collect();
            self.emit_scalar(
                "bfs",
                vec![json!(start)],
                json!(visited_order.clone()),
                meta(vec![
                    ("vertex", json!(vertex)),
                    ("frontier", json!(frontier)),
                ]),
            );
        }

        visited_order
    }

    /// Busca em profundidade (ordem igual à recursiva); um passo por
    /// vértice visitado, carregando a frente de recursão (a pilha).
    pub fn dfs(&self, start: String) -> Vec<String> {
        let mut visited_order = Vec::new();
        if !self.inner.borrow().adjacency.contains_key(&start) {
            return visited_order;
        }

        let mut visited: HashSet<String> = HashSet::new();
        let mut stack: Vec<String> = vec![start.clone()];

        while let Some(vertex) = stack.pop() {
            if !visited.insert(vertex.clone()) {
                continue;
            }
            visited_order.push(vertex.clone());
            // Empilha em ordem reversa para visitar na ordem natural.
            let mut neighbors = self.neighbors(&vertex);
            neighbors.reverse();
            for neighbor in neighbors {
                if !visited.contains(&neighbor) {
                    stack.push(neighbor);
                }
            }
            let front: Vec<String> = stack.iter().cloned().collect();
            self.emit_scalar(
                "dfs",
                vec![json!(start)],
                json!(visited_order.clone()),
                meta(vec![("vertex", json!(vertex)), ("stack", json!(front))]),
            );
        }

        visited_order
    }

    /// Detecção de ciclo: pilha de recursão para grafos dirigidos,
    /// DFS com pai para não-dirigidos. Um passo terminal.
    pub fn has_cycle(&self) -> bool {
        let result = if self.is_directed() {
            self.has_cycle_directed()
        } else {
            self.has_cycle_undirected()
        };
        self.emit_scalar(
            "hasCycle",
            vec![],
            json!(result),
            meta(vec![("directed", json!(self.is_directed()))]),
        );
        result
    }

    fn has_cycle_directed(&self) -> bool {
        fn visit(
            graph: &TrackedGraph,
            vertex: &str,
            visited: &mut HashSet<String>,
            in_stack: &mut HashSet<String>,
        ) -> bool {
            visited.insert(vertex.to_string());
            in_stack.insert(vertex.to_string());
            for neighbor in graph.neighbors(vertex) {
                if in_stack.contains(&neighbor) {
                    return true;
                }
                if !visited.contains(&neighbor) && visit(graph, &neighbor, visited, in_stack) {
                    return true;
                }
            }
            in_stack.remove(vertex);
            false
        }

        let mut visited = HashSet::new();
        let mut in_stack = HashSet::new();
        for vertex in self.vertices() {
            if !visited.contains(&vertex) && visit(self, &vertex, &mut visited, &mut in_stack) {
                return true;
            }
        }
        false
    }

    fn has_cycle_undirected(&self) -> bool {
        // DFS com consciência do pai: revisitar um vértice que não é o
        // pai imediato fecha um ciclo.
        fn visit(
            graph: &TrackedGraph,
            vertex: &str,
            parent: Option<&str>,
            visited: &mut HashSet<String>,
        ) -> bool {
            visited.insert(vertex.to_string());
            for neighbor in graph.neighbors(vertex) {
                if neighbor == vertex {
                    return true; // self-loop
                }
                if !visited.contains(&neighbor) {
                    if visit(graph, &neighbor, Some(vertex), visited) {
                        return true;
                    }
                } else if parent != Some(neighbor.as_str()) {
                    return true;
                }
            }
            false
        }

        let mut visited = HashSet::new();
        for vertex in self.vertices() {
            if !visited.contains(&vertex) && visit(self, &vertex, None, &mut visited) {
                return true;
            }
        }
        false
    }

    /// Caminho mínimo não-ponderado por BFS; `[]` se não há caminho.
    /// Leitura: não emite passos.
    pub fn shortest_path(&self, start: String, end: String) -> Vec<String> {
        {
            let inner = self.inner.borrow();
            if !inner.adjacency.contains_key(&start) || !inner.adjacency.contains_key(&end) {
                return Vec::new();
            }
        }
        if start == end {
            return vec![start];
        }

        let mut predecessor: HashMap<String, String> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        visited.insert(start.clone());
        queue.push_back(start.clone());

        while let Some(vertex) = queue.pop_front() {
            for neighbor in self.neighbors(&vertex) {
                if visited.insert(neighbor.clone()) {
                    predecessor.insert(neighbor.clone(), vertex.clone());
                    if neighbor == end {
                        let mut path = vec![end.clone()];
                        let mut current = end.clone();
                        while let Some(prev) = predecessor.get(&current) {
                            path.push(prev.clone());
                            current = prev.clone();
                        }
                        path.reverse();
                        return path;
                    }
                    queue.push_back(neighbor);
                }
            }
        }

        Vec::new()
    }
}

// ============================================================================
// REGISTRO NO ENGINE
// ============================================================================

/// Chave de vértice a partir de um valor da sandbox (strings e números
/// são aceitos; números viram o texto deles).
fn vertex_key(value: &Dynamic) -> String {
    match dynamic_to_value(value) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn strings_to_dynamic(values: Vec<String>) -> Dynamic {
    value_to_dynamic(&Value::Array(values.into_iter().map(Value::from).collect()))
}

/// Interpreta a lista de arestas vinda da sandbox ou do initialData.
pub fn parse_edges(raw: &Value) -> Vec<(String, String, Option<f64>)> {
    let mut edges = Vec::new();
    if let Value::Array(items) = raw {
        for item in items {
            match item {
                Value::Array(pair) if pair.len() >= 2 => {
                    let from = value_to_key(&pair[0]);
                    let to = value_to_key(&pair[1]);
                    let weight = pair.get(2).and_then(Value::as_f64);
                    edges.push((from, to, weight));
                }
                Value::Object(map) => {
                    let from = map.get("from").map(value_to_key).unwrap_or_default();
                    let to = map.get("to").map(value_to_key).unwrap_or_default();
                    let weight = map.get("weight").and_then(Value::as_f64);
                    if !from.is_empty() && !to.is_empty() {
                        edges.push((from, to, weight));
                    }
                }
                _ => {}
            }
        }
    }
    edges
}

/// Chave de vértice a partir de um JSON.
pub fn value_to_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Registra o tipo, os métodos e os factories de TrackedGraph.
pub fn register(engine: &mut Engine, recorder: &StepRecorder) {
    engine.register_type_with_name::<TrackedGraph>("TrackedGraph");

    engine.register_fn("addVertex", |graph: &mut TrackedGraph, vertex: Dynamic| {
        graph.add_vertex(vertex_key(&vertex));
    });
    engine.register_fn(
        "addEdge",
        |graph: &mut TrackedGraph, from: Dynamic, to: Dynamic| {
            graph.add_edge(vertex_key(&from), vertex_key(&to), None, None);
        },
    );
    engine.register_fn(
        "addEdge",
        |graph: &mut TrackedGraph, from: Dynamic, to: Dynamic, weight: f64| {
            graph.add_edge(vertex_key(&from), vertex_key(&to), Some(weight), None);
        },
    );
    engine.register_fn(
        "addEdge",
        |graph: &mut TrackedGraph, from: Dynamic, to: Dynamic, weight: i64| {
            graph.add_edge(vertex_key(&from), vertex_key(&to), Some(weight as f64), None);
        },
    );
    engine.register_fn(
        "addEdge",
        |graph: &mut TrackedGraph, from: Dynamic, to: Dynamic, weight: f64, directed: bool| {
            graph.add_edge(
                vertex_key(&from),
                vertex_key(&to),
                Some(weight),
                Some(directed),
            );
        },
    );
    engine.register_fn(
        "removeVertex",
        |graph: &mut TrackedGraph, vertex: Dynamic| graph.remove_vertex(vertex_key(&vertex)),
    );
    engine.register_fn(
        "removeEdge",
        |graph: &mut TrackedGraph, from: Dynamic, to: Dynamic| {
            graph.remove_edge(vertex_key(&from), vertex_key(&to))
        },
    );
    engine.register_fn("bfs", |graph: &mut TrackedGraph, start: Dynamic| {
        strings_to_dynamic(graph.bfs(vertex_key(&start)))
    });
    engine.register_fn("dfs", |graph: &mut TrackedGraph, start: Dynamic| {
        strings_to_dynamic(graph.dfs(vertex_key(&start)))
    });
    engine.register_fn("hasCycle", |graph: &mut TrackedGraph| graph.has_cycle());
    engine.register_fn(
        "shortestPath",
        |graph: &mut TrackedGraph, start: Dynamic, end: Dynamic| {
            strings_to_dynamic(graph.shortest_path(vertex_key(&start), vertex_key(&end)))
        },
    );
    engine.register_fn("getVertices", |graph: &mut TrackedGraph| {
        strings_to_dynamic(graph.vertices())
    });
    engine.register_fn("getEdges", |graph: &mut TrackedGraph| {
        let edges: Vec<Value> = graph
            .edges()
            .into_iter()
            .map(|(from, to, weight)| json!({ "from": from, "to": to, "weight": weight }))
            .collect();
        value_to_dynamic(&Value::Array(edges))
    });
    engine.register_fn("getNeighbors", |graph: &mut TrackedGraph, vertex: Dynamic| {
        strings_to_dynamic(graph.neighbors(&vertex_key(&vertex)))
    });
    engine.register_fn("isDirected", |graph: &mut TrackedGraph| graph.is_directed());
    engine.register_fn("getSize", |graph: &mut TrackedGraph| graph.size() as i64);
    engine.register_fn("isEmpty", |graph: &mut TrackedGraph| graph.is_empty());
    engine.register_fn("clear", |graph: &mut TrackedGraph| graph.clear());
    engine.register_fn("getData", |graph: &mut TrackedGraph| {
        value_to_dynamic(&graph.snapshot())
    });

    // Factories.
    let rec = recorder.clone();
    engine.register_fn("createTrackedGraph", move || {
        TrackedGraph::new(false, Some(rec.clone()))
    });
    let rec = recorder.clone();
    engine.register_fn("createTrackedGraph", move |directed: bool| {
        TrackedGraph::new(directed, Some(rec.clone()))
    });
    let rec = recorder.clone();
    engine.register_fn(
        "createTrackedGraphFrom",
        move |vertices: Array, edges: Array, directed: bool| {
            let vertex_names: Vec<String> = vertices.iter().map(vertex_key).collect();
            let edge_values = Value::Array(edges.iter().map(dynamic_to_value).collect());
            TrackedGraph::from_parts(
                vertex_names,
                parse_edges(&edge_values),
                directed,
                Some(rec.clone()),
            )
        },
    );
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_undirected() -> (TrackedGraph, StepRecorder) {
        let recorder = StepRecorder::buffered();
        let graph = TrackedGraph::from_parts(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec![
                ("a".into(), "b".into(), None),
                ("a".into(), "c".into(), None),
                ("b".into(), "d".into(), None),
            ],
            false,
            Some(recorder.clone()),
        );
        (graph, recorder)
    }

    #[test]
    fn test_from_parts_is_silent_and_mirrors_edges() {
        let (graph, recorder) = sample_undirected();
        assert_eq!(recorder.count(), 0);
        assert_eq!(graph.neighbors("a"), vec!["b".to_string(), "c".to_string()]);
        // Aresta espelhada.
        assert!(graph.neighbors("b").contains(&"a".to_string()));
        // Cada aresta não-dirigida aparece uma vez na listagem.
        assert_eq!(graph.edges().len(), 3);
    }

    #[test]
    fn test_add_edge_creates_missing_vertices() {
        let recorder = StepRecorder::buffered();
        let graph = TrackedGraph::new(false, Some(recorder.clone()));
        graph.add_edge("x".into(), "y".into(), Some(2.0), None);

        assert_eq!(graph.size(), 2);
        assert!(graph.neighbors("y").contains(&"x".to_string()));
        let step = &recorder.steps()[0];
        assert_eq!(step.step_type, "addEdge");
        assert_eq!(step.metadata["mirrored"], json!(true));
    }

    #[test]
    fn test_remove_vertex_cascades() {
        let (graph, _) = sample_undirected();
        assert!(graph.remove_vertex("a".into()));
        assert_eq!(graph.size(), 3);
        assert!(!graph.neighbors("b").contains(&"a".to_string()));
        assert!(!graph.neighbors("c").contains(&"a".to_string()));
        assert!(!graph.remove_vertex("zzz".into()));
    }

    #[test]
    fn test_bfs_order_and_frontier_steps() {
        let (graph, recorder) = sample_undirected();
        let order = graph.bfs("a".into());
        assert_eq!(order, vec!["a", "b", "c", "d"]);

        let steps = recorder.steps();
        let bfs_steps: Vec<_> = steps.iter().filter(|s| s.step_type == "bfs").collect();
        assert_eq!(bfs_steps.len(), 4);
        // Primeiro passo: visitou "a", fronteira [b, c].
        assert_eq!(bfs_steps[0].metadata["vertex"], json!("a"));
        assert_eq!(bfs_steps[0].metadata["frontier"], json!(["b", "c"]));
    }

    #[test]
    fn test_dfs_matches_recursive_order() {
        let (graph, recorder) = sample_undirected();
        let order = graph.dfs("a".into());
        assert_eq!(order, vec!["a", "b", "d", "c"]);
        let dfs_steps = recorder
            .steps()
            .into_iter()
            .filter(|s| s.step_type == "dfs")
            .count();
        assert_eq!(dfs_steps, 4);
    }

    #[test]
    fn test_bfs_unknown_start_is_empty() {
        let (graph, _) = sample_undirected();
        assert!(graph.bfs("nope".into()).is_empty());
    }

    #[test]
    fn test_has_cycle_undirected_parent_aware() {
        // Árvore (a-b, a-c, b-d): sem ciclo, mesmo com espelhamento.
        let (tree, recorder) = sample_undirected();
        assert!(!tree.has_cycle());
        let last = recorder.steps().into_iter().last().unwrap();
        assert_eq!(last.step_type, "hasCycle");
        assert_eq!(last.result, json!(false));

        // Fechando o triângulo aparece ciclo.
        tree.add_edge("c".into(), "d".into(), None, None);
        assert!(tree.has_cycle());
    }

    #[test]
    fn test_has_cycle_directed_recursion_stack() {
        let graph = TrackedGraph::from_parts(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                ("a".into(), "b".into(), None),
                ("b".into(), "c".into(), None),
            ],
            true,
            None,
        );
        assert!(!graph.has_cycle());

        graph.add_edge("c".into(), "a".into(), None, None);
        assert!(graph.has_cycle());

        // Diamante dirigido sem retorno não é ciclo.
        let dag = TrackedGraph::from_parts(
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec![
                ("a".into(), "b".into(), None),
                ("a".into(), "c".into(), None),
                ("b".into(), "d".into(), None),
                ("c".into(), "d".into(), None),
            ],
            true,
            None,
        );
        assert!(!dag.has_cycle());
    }

    #[test]
    fn test_shortest_path_bfs() {
        let (graph, recorder) = sample_undirected();
        let before = recorder.count();
        assert_eq!(graph.shortest_path("a".into(), "d".into()), vec!["a", "b", "d"]);
        assert_eq!(graph.shortest_path("a".into(), "a".into()), vec!["a"]);
        assert!(graph
            .shortest_path("a".into(), "inexistente".into())
            .is_empty());
        // Leitura: nenhum passo emitido.
        assert_eq!(recorder.count(), before);

        let disconnected = TrackedGraph::from_parts(
            vec!["a".into(), "b".into()],
            vec![],
            false,
            None,
        );
        assert!(disconnected.shortest_path("a".into(), "b".into()).is_empty());
    }

    #[test]
    fn test_engine_registration() {
        let mut engine = Engine::new();
        let recorder = StepRecorder::buffered();
        register(&mut engine, &recorder);

        let order: Array = engine
            .eval(
                r#"
                let g = createTrackedGraphFrom(["a", "b", "c"], [["a", "b"], ["b", "c"]], false);
                g.bfs("a")
                "#,
            )
            .unwrap();
        let visited: Vec<Value> = order.iter().map(dynamic_to_value).collect();
        assert_eq!(visited, vec![json!("a"), json!("b"), json!("c")]);

        let cycle: bool = engine
            .eval(
                r#"
                let g = createTrackedGraph(true);
                g.addEdge("a", "b");
                g.addEdge("b", "a");
                g.hasCycle()
                "#,
            )
            .unwrap();
        assert!(cycle);
    }
}
