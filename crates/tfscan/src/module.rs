//! modules and the graph of module calls
//!
//! A [Module] is the set of top-level blocks of one directory plus lookup tables for its variables,
//! locals, outputs, providers and module calls. Modules reference each other through `module`
//! blocks; [ModuleGraphBuilder::add_call] records which module a call resolves to.
//!
//! Building the graph resolves every attribute once ([crate::resolve]). After that the graph is
//! read-only and can be shared between threads.
use crate::block::{AttributeRef, Block, BlockRef, SourceRange};
use crate::hcl_documents::HclDocuments;
use crate::result::{ResultKind, ScanResult};
use crate::rule::Severity;
use crate::util::Reference;
use crate::value::Value;
use indexmap::IndexMap;

/// Block types that may appear at the top level of a module
pub const TOP_LEVEL_TYPES: &[&str] = &[
    "data",
    "locals",
    "module",
    "output",
    "provider",
    "resource",
    "terraform",
    "variable",
];

/// Code of diagnostics about the module graph itself
pub const MODULE_GRAPH_CODE: &str = "module-graph";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(usize);

impl ModuleId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// The `module` block in a parent module that instantiates a child module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleCall {
    pub parent: ModuleId,
    pub block: usize,
}

#[derive(Debug)]
pub struct Module {
    id: ModuleId,
    path: String,
    blocks: Vec<Block>,

    // symbol tables, values are indices into `blocks`
    variables: IndexMap<String, usize>,
    locals: IndexMap<String, usize>,
    outputs: IndexMap<String, usize>,
    module_calls: IndexMap<String, usize>,
    providers: IndexMap<String, Vec<usize>>,

    caller: Option<ModuleCall>,
    children: IndexMap<String, ModuleId>,
}

impl Module {
    fn new(id: ModuleId, path: String, blocks: Vec<Block>) -> Self {
        let mut this = Self {
            id,
            path,
            blocks: vec![],
            variables: Default::default(),
            locals: Default::default(),
            outputs: Default::default(),
            module_calls: Default::default(),
            providers: Default::default(),
            caller: None,
            children: Default::default(),
        };

        for block in blocks {
            this.push_block(block);
        }

        this
    }

    fn push_block(&mut self, block: Block) {
        let index = self.blocks.len();

        let table = match block.kind() {
            "variable" => Some(&mut self.variables),
            "output" => Some(&mut self.outputs),
            "module" => Some(&mut self.module_calls),
            _ => None,
        };
        if let (Some(table), Some(name)) = (table, block.label(0)) {
            if table.contains_key(name) {
                tracing::warn!(module = %self.path, block = %block.full_name(), "duplicate declaration ignored");
            } else {
                table.insert(name.to_string(), index);
            }
        }

        match block.kind() {
            "locals" => {
                for attribute in block.attributes() {
                    self.locals
                        .entry(attribute.name().to_string())
                        .or_insert(index);
                }
            }
            "provider" => {
                if let Some(name) = block.label(0) {
                    self.providers
                        .entry(name.to_string())
                        .or_default()
                        .push(index);
                }
            }
            kind if !TOP_LEVEL_TYPES.contains(&kind) => {
                tracing::debug!(module = %self.path, kind, "unexpected top-level block type");
            }
            _ => {}
        }

        self.blocks.push(block);
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Directory (or other name) the module was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> BlockRef<'_> {
        self.blocks.get(index).into()
    }

    pub fn is_root(&self) -> bool {
        self.caller.is_none()
    }

    pub fn caller(&self) -> Option<ModuleCall> {
        self.caller
    }

    /// Child module a `module "<name>"` block resolved to
    pub fn child(&self, call: &str) -> Option<ModuleId> {
        self.children.get(call).copied()
    }

    pub fn variable(&self, name: &str) -> BlockRef<'_> {
        self.lookup(&self.variables, name)
    }

    pub fn output(&self, name: &str) -> BlockRef<'_> {
        self.lookup(&self.outputs, name)
    }

    pub fn module_call(&self, name: &str) -> BlockRef<'_> {
        self.lookup(&self.module_calls, name)
    }

    pub fn local(&self, name: &str) -> AttributeRef<'_> {
        self.lookup(&self.locals, name).get_attribute(name)
    }

    /// All `provider "<name>"` blocks, aliased ones included
    pub fn providers(&self, name: &str) -> Vec<&Block> {
        self.providers
            .get(name)
            .into_iter()
            .flatten()
            .map(|index| &self.blocks[*index])
            .collect()
    }

    fn lookup(&self, table: &IndexMap<String, usize>, name: &str) -> BlockRef<'_> {
        table.get(name).map(|index| &self.blocks[*index]).into()
    }

    pub fn resources(&self, kind: &str) -> Vec<&Block> {
        self.blocks_of("resource", kind)
    }

    pub fn datas(&self, kind: &str) -> Vec<&Block> {
        self.blocks_of("data", kind)
    }

    fn blocks_of(&self, block_kind: &str, type_label: &str) -> Vec<&Block> {
        self.blocks
            .iter()
            .filter(|b| b.kind() == block_kind && b.type_label() == type_label)
            .collect()
    }

    /// Top-level block by type and exact labels
    pub fn find_block(&self, kind: &str, labels: &[&str]) -> BlockRef<'_> {
        self.blocks
            .iter()
            .find(|b| {
                b.kind() == kind
                    && b.labels().len() == labels.len()
                    && b.labels().iter().zip(labels).all(|(l, r)| l == r)
            })
            .into()
    }

    /// Block the first reference of an attribute points to
    ///
    /// `bucket = aws_s3_bucket.logs.id` points to `resource "aws_s3_bucket" "logs"`.
    pub fn referenced_block(&self, attribute: AttributeRef<'_>) -> BlockRef<'_> {
        attribute
            .references()
            .iter()
            .find_map(|reference| match reference {
                Reference::Local(name) => self.locals.get(name.as_str()).map(|i| &self.blocks[*i]),
                other => {
                    let (kind, labels) = other.target()?;
                    self.find_block(kind, &labels).get()
                }
            })
            .into()
    }
}

/// All modules of one scan and the calls between them
#[derive(Debug)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    inputs: IndexMap<String, Value>,
    diagnostics: Vec<ScanResult>,
}

impl ModuleGraph {
    pub fn builder() -> ModuleGraphBuilder {
        ModuleGraphBuilder::default()
    }

    /// The first module added is the root
    pub fn root(&self) -> &Module {
        &self.modules[0]
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.0]
    }

    /// Values supplied for the root module's variables
    pub fn inputs(&self) -> &IndexMap<String, Value> {
        &self.inputs
    }

    /// Problems found while wiring modules together
    pub fn diagnostics(&self) -> &[ScanResult] {
        &self.diagnostics
    }
}

#[derive(Debug, Default)]
pub struct ModuleGraphBuilder {
    modules: Vec<Module>,
    inputs: IndexMap<String, Value>,
    diagnostics: Vec<ScanResult>,
    /// Why a module call was left unwired, by parent and call name
    unresolved: IndexMap<(ModuleId, String), String>,
}

impl ModuleGraphBuilder {
    /// Add a module from parsed documents. The first module added is the root.
    pub fn add_module(&mut self, path: impl Into<String>, documents: &HclDocuments) -> ModuleId {
        let path = path.into();
        for (_, source, attribute) in documents.attributes() {
            tracing::warn!(
                module = %path,
                file = ?source.path(),
                attribute = attribute.key.value().as_str(),
                "top-level attribute ignored"
            );
        }

        let blocks = documents
            .blocks()
            .map(|(_, source, block)| Block::from_hcl(block, source))
            .collect();
        self.add_blocks(path, blocks)
    }

    /// Add a module from blocks built elsewhere
    pub fn add_blocks(&mut self, path: impl Into<String>, blocks: Vec<Block>) -> ModuleId {
        let id = ModuleId(self.modules.len());
        self.modules.push(Module::new(id, path.into(), blocks));
        id
    }

    /// Wire `module "<name>"` in `parent` to `child`
    ///
    /// A child has at most one caller and may not call one of its ancestors. Invalid calls are
    /// reported as diagnostics and not recorded.
    pub fn add_call(&mut self, parent: ModuleId, name: &str, child: ModuleId) {
        let Some(block) = self.modules[parent.0].module_calls.get(name).copied() else {
            let message = format!(
                "Module call '{name}' does not exist in {}",
                self.modules[parent.0].path
            );
            self.diagnostic(message, SourceRange::default());
            return;
        };

        let range = self.modules[parent.0].blocks[block].range().clone();

        if self.modules[child.0].caller.is_some() || self.is_ancestor(child, parent) {
            self.diagnostic(
                format!("Module call '{name}' would create a cycle or a second caller"),
                range,
            );
            return;
        }

        self.modules[child.0].caller = Some(ModuleCall { parent, block });
        self.modules[parent.0]
            .children
            .insert(name.to_string(), child);
    }

    /// Record why `module "<name>"` in `parent` could not be loaded
    ///
    /// The reason is appended to the call's dangling module diagnostic.
    pub fn unresolved(&mut self, parent: ModuleId, name: &str, reason: impl Into<String>) {
        self.unresolved
            .insert((parent, name.to_string()), reason.into());
    }

    fn is_ancestor(&self, candidate: ModuleId, of: ModuleId) -> bool {
        let mut current = Some(of);
        while let Some(id) = current {
            if id == candidate {
                return true;
            }
            current = self.modules[id.0].caller.map(|call| call.parent);
        }
        false
    }

    /// Supply a value for a variable of the root module
    pub fn input(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    pub fn inputs(&mut self, inputs: impl IntoIterator<Item = (String, Value)>) -> &mut Self {
        self.inputs.extend(inputs);
        self
    }

    fn diagnostic(&mut self, message: String, range: SourceRange) {
        self.diagnostics.push(graph_diagnostic(message, range));
    }

    /// Finish wiring, resolve all attributes and report dangling module calls
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn build(mut self) -> ModuleGraph {
        if self.modules.is_empty() {
            self.add_blocks(".", vec![]);
        }

        let unresolved = self.unresolved;
        let mut graph = ModuleGraph {
            modules: self.modules,
            inputs: self.inputs,
            diagnostics: self.diagnostics,
        };
        crate::resolve::resolve_all(&graph);

        let mut dangling = vec![];
        for module in &graph.modules {
            for (name, index) in &module.module_calls {
                if module.children.contains_key(name) {
                    continue;
                }
                let block = &module.blocks[*index];
                let source = match block.get_attribute("source").as_str() {
                    Some(source) => format!(" (source \"{source}\")"),
                    None => String::new(),
                };
                let reason = match unresolved.get(&(module.id, name.clone())) {
                    Some(reason) => format!(": {reason}"),
                    None => String::new(),
                };
                dangling.push(graph_diagnostic(
                    format!(
                        "Module '{name}' in {} could not be resolved{source}{reason}",
                        module.path
                    ),
                    block.range().clone(),
                ));
            }
        }
        graph.diagnostics.extend(dangling);

        graph
    }
}

fn graph_diagnostic(message: String, range: SourceRange) -> ScanResult {
    tracing::warn!(%message, "module graph");
    ScanResult::new(
        MODULE_GRAPH_CODE,
        Severity::Info,
        message,
        ResultKind::Diagnostic,
        range,
    )
}
