//! # TrackedBinaryTree - Árvore de Busca Binária Instrumentada
//!
//! BST clássica. `insert` desce registrando caminho e direção e
//! rejeita duplicatas; `search` emite um passo com o caminho
//! percorrido; `delete` implementa os três casos padrão (folha, um
//! filho, dois filhos via sucessor in-order) e rotula o passo com o
//! caso; as travessias emitem um único passo com o resultado completo.
//!
//! `toHierarchy` devolve mapas aninhados `{value, left, right}`, o
//! formato que submissões de travessia manual percorrem.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use rhai::{Array, Dynamic, Engine, EvalAltResult};
use serde_json::{json, Value};

use super::{cmp_values, dynamic_to_value, meta, value_to_dynamic, StepRecorder};

const TARGET: &str = "binaryTree";

// ============================================================================
// TIPO
// ============================================================================

struct TreeNode {
    value: Value,
    left: Option<Box<TreeNode>>,
    right: Option<Box<TreeNode>>,
}

impl TreeNode {
    fn leaf(value: Value) -> Box<TreeNode> {
        Box::new(TreeNode {
            value,
            left: None,
            right: None,
        })
    }
}

struct TreeInner {
    root: Option<Box<TreeNode>>,
    size: usize,
}

/// Handle compartilhado de uma árvore de busca binária rastreada.
#[derive(Clone)]
pub struct TrackedBinaryTree {
    inner: Rc<RefCell<TreeInner>>,
    recorder: Option<StepRecorder>,
}

impl TrackedBinaryTree {
    /// Cria uma árvore; a carga inicial insere em silêncio (duplicatas
    /// da carga são ignoradas).
    pub fn new(initial: Vec<Value>, recorder: Option<StepRecorder>) -> Self {
        let tree = Self {
            inner: Rc::new(RefCell::new(TreeInner {
                root: None,
                size: 0,
            })),
            recorder,
        };
        for value in initial {
            let _ = tree.insert_silent(value);
        }
        tree
    }

    pub fn size(&self) -> usize {
        self.inner.borrow().size
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Hierarquia `{value, left, right}` (null nas pontas). Não emite.
    pub fn snapshot(&self) -> Value {
        fn hierarchy(node: &Option<Box<TreeNode>>) -> Value {
            match node {
                None => Value::Null,
                Some(n) => json!({
                    "value": n.value,
                    "left": hierarchy(&n.left),
                    "right": hierarchy(&n.right),
                }),
            }
        }
        hierarchy(&self.inner.borrow().root)
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

    /// Insere sem emitir passo. Retorna `false` para duplicata.
    fn insert_silent(&self, value: Value) -> Result<(bool, Vec<Value>), String> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let mut path = Vec::new();

        if inner.root.is_none() {
            inner.root = Some(TreeNode::leaf(value));
            inner.size += 1;
            return Ok((true, path));
        }

        let mut current = inner.root.as_mut().expect("checked above");
        loop {
            path.push(current.value.clone());
            match cmp_values(&value, &current.value)? {
                Ordering::Equal => return Ok((false, path)),
                Ordering::Less => {
                    if current.left.is_none() {
                        current.left = Some(TreeNode::leaf(value));
                        inner.size += 1;
                        return Ok((true, path));
                    }
                    current = current.left.as_mut().expect("checked above");
                }
                Ordering::Greater => {
                    if current.right.is_none() {
                        current.right = Some(TreeNode::leaf(value));
                        inner.size += 1;
                        return Ok((true, path));
                    }
                    current = current.right.as_mut().expect("checked above");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Operações instrumentadas
    // ------------------------------------------------------------------

    /// Insere respeitando a ordem da BST; duplicatas são rejeitadas e
    /// o passo sai com `inserted:false, duplicate:true`.
    pub fn insert(&self, value: Value) -> Result<bool, String> {
        let (inserted, path) = self.insert_silent(value.clone())?;
        let direction = if inserted {
            path.last()
                .map(|parent| match cmp_values(&value, parent) {
                    Ok(Ordering::Less) => json!("left"),
                    Ok(_) => json!("right"),
                    Err(_) => Value::Null,
                })
                .unwrap_or(json!("root"))
        } else {
            Value::Null
        };

        self.emit(
            "insert",
            vec![value.clone()],
            meta(vec![
                ("value", value),
                ("inserted", json!(inserted)),
                ("duplicate", json!(!inserted)),
                ("path", Value::Array(path)),
                ("direction", direction),
            ]),
        );
        Ok(inserted)
    }

    /// Busca; um passo carregando o caminho percorrido.
    pub fn search(&self, value: Value) -> Result<bool, String> {
        let mut path = Vec::new();
        let found = {
            let inner = self.inner.borrow();
            let mut current = inner.root.as_deref();
            let mut found = false;
            while let Some(node) = current {
                path.push(node.value.clone());
                match cmp_values(&value, &node.value)? {
                    Ordering::Equal => {
                        found = true;
                        break;
                    }
                    Ordering::Less => current = node.left.as_deref(),
                    Ordering::Greater => current = node.right.as_deref(),
                }
            }
            found
        };

        self.emit_scalar(
            "search",
            vec![value.clone()],
            json!(found),
            meta(vec![
                ("value", value),
                ("path", Value::Array(path)),
                ("found", json!(found)),
            ]),
        );
        Ok(found)
    }

    /// Remoção BST nos três casos clássicos. O passo sai rotulado com
    /// o caso aplicado.
    pub fn delete(&self, value: Value) -> Result<bool, String> {
        let (deleted, case) = {
            let mut inner = self.inner.borrow_mut();
            let mut deleted = false;
            let mut case: Option<&'static str> = None;
            let root = inner.root.take();
            inner.root = delete_node(root, &value, &mut deleted, &mut case)?;
            if deleted {
                inner.size -= 1;
            }
            (deleted, case)
        };

        self.emit(
            "delete",
            vec![value.clone()],
            meta(vec![
                ("value", value),
                ("deleted", json!(deleted)),
                ("case", case.map(Value::from).unwrap_or(Value::Null)),
            ]),
        );
        Ok(deleted)
    }

    fn collect_traversal(&self, order: Traversal) -> Vec<Value> {
        fn walk(node: &Option<Box<TreeNode>>, order: Traversal, out: &mut Vec<Value>) {
            if let Some(n) = node {
                match order {
                    Traversal::In => {
                        walk(&n.left, order, out);
                        out.push(n.value.clone());
                        walk(&n.right, order, out);
                    }
                    Traversal::Pre => {
                        out.push(n.value.clone());
                        walk(&n.left, order, out);
                        walk(&n.right, order, out);
                    }
                    Traversal::Post => {
                        walk(&n.left, order, out);
                        walk(&n.right, order, out);
                        out.push(n.value.clone());
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.inner.borrow().root, order, &mut out);
        out
    }

    /// Travessia in-order; um passo com o resultado completo.
    pub fn inorder_traversal(&self) -> Vec<Value> {
        let result = self.collect_traversal(Traversal::In);
        self.emit_scalar(
            "inorderTraversal",
            vec![],
            Value::Array(result.clone()),
            meta(vec![]),
        );
        result
    }

    /// Travessia pre-order; um passo com o resultado completo.
    pub fn preorder_traversal(&self) -> Vec<Value> {
        let result = self.collect_traversal(Traversal::Pre);
        self.emit_scalar(
            "preorderTraversal",
            vec![],
            Value::Array(result.clone()),
            meta(vec![]),
        );
        result
    }

    /// Travessia post-order; um passo com o resultado completo.
    pub fn postorder_traversal(&self) -> Vec<Value> {
        let result = self.collect_traversal(Traversal::Post);
        self.emit_scalar(
            "postorderTraversal",
            vec![],
            Value::Array(result.clone()),
            meta(vec![]),
        );
        result
    }

    /// Valida a propriedade de BST por faixas (−∞, +∞); um passo com o
    /// resultado.
    pub fn is_valid_bst(&self) -> bool {
        fn valid(node: &Option<Box<TreeNode>>, min: Option<&Value>, max: Option<&Value>) -> bool {
            match node {
                None => true,
                Some(n) => {
                    if let Some(min) = min {
                        if cmp_values(&n.value, min).map(|o| o != Ordering::Greater).unwrap_or(true)
                        {
                            return false;
                        }
                    }
                    if let Some(max) = max {
                        if cmp_values(&n.value, max).map(|o| o != Ordering::Less).unwrap_or(true) {
                            return false;
                        }
                    }
                    valid(&n.left, min, Some(&n.value)) && valid(&n.right, Some(&n.value), max)
                }
            }
        }
        let result = valid(&self.inner.borrow().root, None, None);
        self.emit_scalar("isValidBST", vec![], json!(result), meta(vec![]));
        result
    }

    /// Altura da árvore (0 para vazia). Leitura: não emite passo.
    pub fn height(&self) -> i64 {
        fn depth(node: &Option<Box<TreeNode>>) -> i64 {
            match node {
                None => 0,
                Some(n) => 1 + depth(&n.left).max(depth(&n.right)),
            }
        }
        depth(&self.inner.borrow().root)
    }

    pub fn clear(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.root = None;
            inner.size = 0;
        }
        self.emit("clear", vec![], meta(vec![]));
    }
}

#[derive(Clone, Copy)]
enum Traversal {
    In,
    Pre,
    Post,
}

/// Remoção recursiva; devolve a subárvore reconstruída.
fn delete_node(
    node: Option<Box<TreeNode>>,
    value: &Value,
    deleted: &mut bool,
    case: &mut Option<&'static str>,
) -> Result<Option<Box<TreeNode>>, String> {
    let mut node = match node {
        None => return Ok(None),
        Some(n) => n,
    };

    match cmp_values(value, &node.value)? {
        Ordering::Less => {
            node.left = delete_node(node.left.take(), value, deleted, case)?;
            Ok(Some(node))
        }
        Ordering::Greater => {
            node.right = delete_node(node.right.take(), value, deleted, case)?;
            Ok(Some(node))
        }
        Ordering::Equal => {
            *deleted = true;
            match (node.left.take(), node.right.take()) {
                // Caso 1: folha.
                (None, None) => {
                    *case = Some("leaf");
                    Ok(None)
                }
                // Caso 2: um filho.
                (Some(child), None) | (None, Some(child)) => {
                    *case = Some("oneChild");
                    Ok(Some(child))
                }
                // Caso 3: dois filhos; substitui pelo sucessor in-order.
                (Some(left), Some(right)) => {
                    *case = Some("twoChildren");
                    let successor = min_value(&right);
                    node.value = successor.clone();
                    node.left = Some(left);
                    let mut ignore_deleted = false;
                    let mut ignore_case = None;
                    node.right = delete_node(
                        Some(right),
                        &successor,
                        &mut ignore_deleted,
                        &mut ignore_case,
                    )?;
                    Ok(Some(node))
                }
            }
        }
    }
}

fn min_value(node: &TreeNode) -> Value {
    let mut current = node;
    while let Some(left) = current.left.as_deref() {
        current = left;
    }
    current.value.clone()
}

// ============================================================================
// REGISTRO NO ENGINE
// ============================================================================

/// Registra o tipo, os métodos e os factories de TrackedBinaryTree.
pub fn register(engine: &mut Engine, recorder: &StepRecorder) {
    engine.register_type_with_name::<TrackedBinaryTree>("TrackedBinaryTree");

    engine.register_fn(
        "insert",
        |tree: &mut TrackedBinaryTree, value: Dynamic| -> Result<bool, Box<EvalAltResult>> {
            tree.insert(dynamic_to_value(&value)).map_err(Into::into)
        },
    );
    engine.register_fn(
        "search",
        |tree: &mut TrackedBinaryTree, value: Dynamic| -> Result<bool, Box<EvalAltResult>> {
            tree.search(dynamic_to_value(&value)).map_err(Into::into)
        },
    );
    engine.register_fn(
        "delete",
        |tree: &mut TrackedBinaryTree, value: Dynamic| -> Result<bool, Box<EvalAltResult>> {
            tree.delete(dynamic_to_value(&value)).map_err(Into::into)
        },
    );
    engine.register_fn("inorderTraversal", |tree: &mut TrackedBinaryTree| {
        value_to_dynamic(&Value::Array(tree.inorder_traversal()))
    });
    engine.register_fn("preorderTraversal", |tree: &mut TrackedBinaryTree| {
        value_to_dynamic(&Value::Array(tree.preorder_traversal()))
    });
    engine.register_fn("postorderTraversal", |tree: &mut TrackedBinaryTree| {
        value_to_dynamic(&Value::Array(tree.postorder_traversal()))
    });
    engine.register_fn("isValidBST", |tree: &mut TrackedBinaryTree| {
        tree.is_valid_bst()
    });
    engine.register_fn("getHeight", |tree: &mut TrackedBinaryTree| tree.height());
    engine.register_fn("clear", |tree: &mut TrackedBinaryTree| tree.clear());
    engine.register_fn("getSize", |tree: &mut TrackedBinaryTree| tree.size() as i64);
    engine.register_fn("isEmpty", |tree: &mut TrackedBinaryTree| tree.is_empty());
    engine.register_fn("toHierarchy", |tree: &mut TrackedBinaryTree| {
        value_to_dynamic(&tree.snapshot())
    });
    engine.register_fn("getData", |tree: &mut TrackedBinaryTree| {
        value_to_dynamic(&tree.snapshot())
    });
    engine.register_fn("toArray", |tree: &mut TrackedBinaryTree| {
        value_to_dynamic(&Value::Array(tree.collect_traversal(Traversal::In)))
    });

    let rec = recorder.clone();
    engine.register_fn("createTrackedBinaryTree", move || {
        TrackedBinaryTree::new(Vec::new(), Some(rec.clone()))
    });
    let rec = recorder.clone();
    engine.register_fn("createTrackedBinaryTree", move |initial: Array| {
        let items: Vec<Value> = initial.iter().map(dynamic_to_value).collect();
        TrackedBinaryTree::new(items, Some(rec.clone()))
    });
}

// ============================================================================
// TESTES
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tracked(values: Vec<Value>) -> (TrackedBinaryTree, StepRecorder) {
        let recorder = StepRecorder::buffered();
        (
            TrackedBinaryTree::new(values, Some(recorder.clone())),
            recorder,
        )
    }

    #[test]
    fn test_inorder_is_sorted_after_inserts() {
        let (tree, _) = tracked(vec![]);
        for v in [8, 3, 10, 1, 6, 14, 4, 7] {
            assert!(tree.insert(json!(v)).unwrap());
        }
        let inorder = tree.inorder_traversal();
        let values: Vec<i64> = inorder.iter().map(|v| v.as_i64().unwrap()).collect();
        let mut sorted = values.clone();
        sorted.sort_unstable();
        assert_eq!(values, sorted);
        assert_eq!(tree.size(), 8);
    }

    #[test]
    fn test_duplicate_insert_rejected_with_metadata() {
        let (tree, recorder) = tracked(vec![json!(5)]);
        assert!(!tree.insert(json!(5)).unwrap());
        assert_eq!(tree.size(), 1);

        let step = recorder.steps().into_iter().last().unwrap();
        assert_eq!(step.step_type, "insert");
        assert_eq!(step.metadata["inserted"], json!(false));
        assert_eq!(step.metadata["duplicate"], json!(true));
    }

    #[test]
    fn test_insert_records_path_and_direction() {
        let (tree, recorder) = tracked(vec![json!(8), json!(3)]);
        tree.insert(json!(6)).unwrap();

        let step = recorder.steps().into_iter().last().unwrap();
        assert_eq!(step.metadata["path"], json!([8, 3]));
        assert_eq!(step.metadata["direction"], json!("right"));
    }

    #[test]
    fn test_search_carries_traversed_path() {
        let (tree, recorder) = tracked(vec![json!(8), json!(3), json!(10), json!(6)]);
        assert!(tree.search(json!(6)).unwrap());

        let step = recorder.steps().into_iter().last().unwrap();
        assert_eq!(step.step_type, "search");
        assert_eq!(step.metadata["path"], json!([8, 3, 6]));
        assert_eq!(step.result, json!(true));

        assert!(!tree.search(json!(99)).unwrap());
    }

    #[test]
    fn test_delete_leaf_case() {
        let (tree, recorder) = tracked(vec![json!(8), json!(3)]);
        assert!(tree.delete(json!(3)).unwrap());
        let step = recorder.steps().into_iter().last().unwrap();
        assert_eq!(step.metadata["case"], json!("leaf"));
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn test_delete_one_child_case() {
        let (tree, recorder) = tracked(vec![json!(8), json!(3), json!(1)]);
        assert!(tree.delete(json!(3)).unwrap());
        let step = recorder.steps().into_iter().last().unwrap();
        assert_eq!(step.metadata["case"], json!("oneChild"));
        assert_eq!(
            tree.inorder_traversal(),
            vec![json!(1), json!(8)]
        );
    }

    #[test]
    fn test_delete_two_children_uses_inorder_successor() {
        let (tree, recorder) = tracked(vec![
            json!(8),
            json!(3),
            json!(10),
            json!(1),
            json!(6),
            json!(9),
            json!(14),
        ]);
        assert!(tree.delete(json!(8)).unwrap());

        let step = recorder.steps().into_iter().last().unwrap();
        assert_eq!(step.metadata["case"], json!("twoChildren"));

        // Sucessor in-order de 8 é 9; a ordem se mantém.
        let inorder = tree.inorder_traversal();
        assert_eq!(
            inorder,
            vec![json!(1), json!(3), json!(6), json!(9), json!(10), json!(14)]
        );
        assert_eq!(tree.size(), 6);
        assert!(tree.is_valid_bst());
    }

    #[test]
    fn test_delete_missing_value() {
        let (tree, _) = tracked(vec![json!(5)]);
        assert!(!tree.delete(json!(42)).unwrap());
        assert_eq!(tree.size(), 1);
    }

    #[test]
    fn test_traversals_on_empty_tree() {
        let (tree, _) = tracked(vec![]);
        assert!(tree.inorder_traversal().is_empty());
        assert!(tree.preorder_traversal().is_empty());
        assert!(tree.postorder_traversal().is_empty());
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn test_preorder_and_postorder() {
        let (tree, _) = tracked(vec![json!(8), json!(3), json!(10)]);
        assert_eq!(
            tree.preorder_traversal(),
            vec![json!(8), json!(3), json!(10)]
        );
        assert_eq!(
            tree.postorder_traversal(),
            vec![json!(3), json!(10), json!(8)]
        );
    }

    #[test]
    fn test_hierarchy_shape() {
        let (tree, _) = tracked(vec![json!(2), json!(1), json!(3)]);
        let hierarchy = tree.snapshot();
        assert_eq!(hierarchy["value"], json!(2));
        assert_eq!(hierarchy["left"]["value"], json!(1));
        assert_eq!(hierarchy["right"]["value"], json!(3));
        assert_eq!(hierarchy["left"]["left"], Value::Null);
    }

    #[test]
    fn test_clear_and_is_valid() {
        let (tree, _) = tracked(vec![json!(1), json!(2)]);
        assert!(tree.is_valid_bst());
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.is_valid_bst());
    }

    #[test]
    fn test_engine_registration() {
        let mut engine = Engine::new();
        let recorder = StepRecorder::buffered();
        register(&mut engine, &recorder);

        let result: Array = engine
            .eval(
                r#"
                let t = createTrackedBinaryTree([8, 3, 10]);
                t.insert(6);
                t.inorderTraversal()
                "#,
            )
            .unwrap();
        let values: Vec<Value> = result.iter().map(dynamic_to_value).collect();
        assert_eq!(values, vec![json!(3), json!(6), json!(8), json!(10)]);

        let found: bool = engine
            .eval("let t = createTrackedBinaryTree([5]); t.search(5)")
            .unwrap();
        assert!(found);
    }
}
