//! loading a configuration directory from disk
//!
//! The root directory becomes the root module. Every `module` block with a local `source`
//! (`./...` or `../...`) is followed into its directory and loaded as a child module. Everything
//! that can't be followed (registry or git sources, missing or unparsable directories, directories
//! that are already being loaded further up) is left unwired and reported by
//! [ModuleGraphBuilder::build](crate::module::ModuleGraphBuilder::build), with the reason when
//! there is one.
use crate::hcl_documents::{HclDocuments, LoadError};
use crate::module::{ModuleGraph, ModuleGraphBuilder, ModuleId};
use crate::value::Value;
use hcl::eval::Evaluate;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Load `dir` and all local modules it calls. `inputs` are values for the root module's variables.
#[tracing::instrument(level = "info", skip(inputs), fields(dir = %dir.display()))]
pub fn load_module_graph(
    dir: &Path,
    inputs: impl IntoIterator<Item = (String, Value)>,
) -> Result<ModuleGraph, LoadError> {
    let root = dir.canonicalize()?;

    let mut documents = HclDocuments::default();
    documents.load_directory(&root)?;

    let mut builder = ModuleGraph::builder();
    builder.inputs(inputs);
    let id = builder.add_module(".", &documents);

    let mut loader = Loader {
        root: root.clone(),
        builder,
        ancestors: vec![root.clone()],
    };
    loader.load_calls(id, &root, &documents)?;

    Ok(loader.builder.build())
}

struct Loader {
    root: PathBuf,
    builder: ModuleGraphBuilder,
    ancestors: Vec<PathBuf>,
}

impl Loader {
    fn load_calls(
        &mut self,
        parent: ModuleId,
        dir: &Path,
        documents: &HclDocuments,
    ) -> Result<(), LoadError> {
        for (_, _, block) in documents.blocks() {
            if block.ident.value().as_str() != "module" {
                continue;
            }
            let Some(name) = block.labels.first().map(|label| label.as_str()) else {
                continue;
            };
            let Some(source) = local_source(block) else {
                tracing::debug!(module = name, "module source is not local, skipping");
                continue;
            };

            let child_dir = match dir.join(&source).canonicalize() {
                Ok(child_dir) => child_dir,
                Err(err) => {
                    tracing::warn!(module = name, %source, %err, "module directory not found");
                    self.builder
                        .unresolved(parent, name, format!("directory not found ({err})"));
                    continue;
                }
            };
            if self.ancestors.contains(&child_dir) {
                tracing::warn!(module = name, %source, "module calls itself, not following");
                self.builder
                    .unresolved(parent, name, "directory is already being loaded");
                continue;
            }

            let mut child_documents = HclDocuments::default();
            if let Err(err) = child_documents.load_directory(&child_dir) {
                tracing::warn!(module = name, %source, %err, "module directory not loadable");
                self.builder.unresolved(parent, name, err.to_string());
                continue;
            }

            let path = self.label(&child_dir);
            let child = self.builder.add_module(path, &child_documents);
            self.builder.add_call(parent, name, child);

            self.ancestors.push(child_dir.clone());
            let result = self.load_calls(child, &child_dir, &child_documents);
            self.ancestors.pop();
            result?;
        }

        Ok(())
    }

    /// Module path shown in reports: relative to the root when possible
    fn label(&self, dir: &Path) -> String {
        match dir.strip_prefix(&self.root) {
            Ok(relative) => format!("./{}", relative.display()),
            Err(_) => dir.display().to_string(),
        }
    }
}

fn local_source(block: &hcl_edit::structure::Block) -> Option<String> {
    let attribute = block
        .body
        .attributes()
        .find(|attribute| attribute.key.value().as_str() == "source")?;

    match hcl::Expression::from(attribute.value.clone()) {
        hcl::Expression::String(source)
            if source.starts_with("./") || source.starts_with("../") =>
        {
            Some(source)
        }
        _ => None,
    }
}

/// Variable values from a `.tfvars` file
///
/// Every top-level attribute is evaluated on its own; attributes that aren't constant become
/// [Value::Unknown].
pub fn load_tfvars(path: &Path) -> Result<IndexMap<String, Value>, LoadError> {
    let mut documents = HclDocuments::default();
    documents.load_file(path)?;

    let context = hcl::eval::Context::new();
    let mut values = IndexMap::new();
    for (_, _, attribute) in documents.attributes() {
        let name = attribute.key.value().as_str().to_string();
        let value = match hcl::Expression::from(attribute.value.clone()).evaluate(&context) {
            Ok(value) => Value::from(value),
            Err(errors) => {
                tracing::warn!(variable = %name, %errors, "tfvars value is not a constant");
                Value::Unknown
            }
        };
        values.insert(name, value);
    }

    for (_, _, block) in documents.blocks() {
        tracing::warn!(block = block.ident.value().as_str(), "blocks are not allowed in tfvars files");
    }

    Ok(values)
}
