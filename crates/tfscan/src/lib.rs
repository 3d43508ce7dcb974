//! # tfscan - static security analysis for terraform
//!
//! ## Introduction for developers
//!
//! Read this to understand how `tfscan` works internally.
//!
//! ### Terraform in HCL terms
//!
//! A terraform configuration is a directory of `.tf` files. Each file is an HCL `body` made of
//! `attributes` (`key = value`) and `blocks` (`identifier label* { body }`). Terraform only uses
//! blocks at the top level:
//!
//! ```hcl
//! variable "public" {
//!   default = false
//! }
//!
//! resource "aws_mq_broker" "main" {
//!   broker_name         = "main"
//!   publicly_accessible = var.public
//!
//!   logs {
//!     general = true
//!   }
//! }
//! ```
//!
//! A directory is a `module`. `module "x" { source = "./x" }` calls another directory as a child
//! module.
//!
//! ### Loading
//!
//! [loader::load_module_graph] parses every `.tf` file of a directory into
//! [hcl_documents::HclDocuments] (which keeps the source path and a line index) and follows local
//! module calls. Each directory becomes a [module::Module] made of [block::Block]s that own their
//! [block::Attribute]s and know the file and lines they came from.
//!
//! ### Resolving
//!
//! Checks want values, not expressions: `publicly_accessible = var.public` should read as
//! `false`. When [module::ModuleGraphBuilder::build] finishes the graph, every attribute is
//! resolved once ([resolve]) and the [value::Value] is memoized on the attribute. Anything that
//! can't be determined statically is [value::Value::Unknown]; resolution never fails.
//!
//! ### Checking
//!
//! A [rule::Rule] says which blocks it applies to (block type, first label, an optional
//! predicate) and carries a [rule::Check]. Rules are collected in a [registry::RegistryBuilder]
//! and frozen into a [registry::Registry]. The [scanner::Scanner] offers every block to every
//! matching rule and collects what the checks report into a [result::Report].
//!
//! Checks never need to test for absence: [block::Block::get_attribute] and
//! [block::Block::get_block] return nil-able references whose queries simply answer `false`.
//!
//! ```
//! use tfscan::module::ModuleGraph;
//! use tfscan::registry::RegistryBuilder;
//! use tfscan::scanner::{ScanOptions, Scanner};
//!
//! let documents = tfscan::hcl_documents! {r#"
//! variable "public" { default = true }
//! resource "aws_mq_broker" "main" { publicly_accessible = var.public }
//! "#};
//! let mut builder = ModuleGraph::builder();
//! builder.add_module(".", &documents);
//! let graph = builder.build();
//!
//! let mut registry = RegistryBuilder::new();
//! tfscan::rules::register_all(&mut registry).unwrap();
//! let registry = registry.finalize();
//!
//! let report = Scanner::new(&registry, &ScanOptions::default()).scan(&graph);
//! assert_eq!(report.findings().count(), 1);
//! ```
pub mod block;
mod functions;
pub mod hcl_documents;
pub mod loader;
pub mod module;
pub mod registry;
mod resolve;
pub mod result;
pub mod rule;
pub mod rules;
pub mod scanner;
pub mod util;
pub mod value;
mod visit;
