//! collection of parsed hcl documents ([Body] and the file it came from)
//!
//! [HclDocuments] tracks
//! - the source file (path and line offsets)
//! - the root blocks
//! - the root attributes
//! and defines a numeric index for each. Once added those indices are stable (removal is not possible)
use hcl_edit::structure::{Attribute, Block, Body, Structure};
use std::ops::Range;
use std::path::{Path, PathBuf};

#[derive(Default, Debug)]
pub struct HclDocuments {
    sources: Vec<SourceFile>,
    root_attributes: Vec<(usize, Attribute)>,
    root_blocks: Vec<(usize, Block)>,
}

impl HclDocuments {
    /// Parses, inserts and indexes an hcl document
    pub fn insert_str(
        &mut self,
        text: &str,
        path: impl Into<Option<PathBuf>>,
    ) -> Result<(), LoadError> {
        let body = hcl_edit::parser::parse_body(text)?;
        self.insert(body, SourceFile::new(path.into(), text));
        Ok(())
    }

    fn insert(&mut self, document: Body, source: SourceFile) {
        let source_index = self.sources.len();
        self.sources.push(source);

        for structure in document.into_iter() {
            match structure {
                Structure::Block(block) => self.root_blocks.push((source_index, block)),
                Structure::Attribute(attribute) => {
                    self.root_attributes.push((source_index, attribute))
                }
            }
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = SourceAttribute> {
        self.root_attributes
            .iter()
            .enumerate()
            .map(|(index, (source_index, attribute))| {
                (index, &self.sources[*source_index], attribute)
            })
    }

    pub fn get_block(&self, index: usize) -> SourceBlock {
        let (source_index, block) = &self.root_blocks[index];
        (index, &self.sources[*source_index], block)
    }

    pub fn blocks(&self) -> impl Iterator<Item = SourceBlock> {
        self.root_blocks
            .iter()
            .enumerate()
            .map(|(index, (source_index, block))| (index, &self.sources[*source_index], block))
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

impl HclDocuments {
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading file");

        let file_contents = std::fs::read_to_string(&file_path)?;
        let body = hcl_edit::parser::parse_body(&file_contents).map_err(|source| {
            LoadError::FileParseFailed {
                path: file_path.clone(),
                source,
            }
        })?;
        self.insert(body, SourceFile::new(Some(file_path), &file_contents));
        Ok(())
    }

    /// Loads every `*.tf` file of a directory (not recursive), in file name order
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), LoadError> {
        let mut file_paths = vec![];

        let read_dir = std::fs::read_dir(dir_path)?;
        for dir_entry in read_dir {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }

            let is_tf_file = dir_entry.file_name().to_string_lossy().ends_with(".tf");
            if !is_tf_file {
                continue;
            }

            file_paths.push(dir_entry.path());
        }

        if file_paths.is_empty() {
            return Err(LoadError::NoFilesFound);
        }

        file_paths.sort();
        for file_path in file_paths {
            self.load_file(&file_path)?;
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("No files found in directory")]
    NoFilesFound,
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse hcl file")]
    HclParseFailed(#[from] hcl_edit::parser::Error),
    #[error(
        "Unable to parse {}:{}:{}: {}",
        .path.display(),
        .source.location().line(),
        .source.location().column(),
        .source.message()
    )]
    FileParseFailed {
        path: PathBuf,
        source: hcl_edit::parser::Error,
    },
}

/// Path of a loaded document and the byte offsets its lines start at
#[derive(Debug)]
pub struct SourceFile {
    path: Source,
    line_starts: Vec<usize>,
}

impl SourceFile {
    fn new(path: Source, text: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(offset, _)| offset + 1))
            .collect();
        Self { path, line_starts }
    }

    pub fn path(&self) -> &Source {
        &self.path
    }

    /// 1-based line that contains the byte offset
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|start| *start <= offset)
    }

    /// 1-based, inclusive line range of a byte span
    pub fn lines_of(&self, span: Option<Range<usize>>) -> (usize, usize) {
        match span {
            Some(span) => (
                self.line_of(span.start),
                self.line_of(span.end.saturating_sub(1).max(span.start)),
            ),
            None => (0, 0),
        }
    }
}

/// Utility macro to create [HclDocuments]
///
/// Create from a single document
/// ```
/// # use tfscan::hcl_documents;
/// hcl_documents!(r#"resource "aws_mq_broker" "x" {}"#);
/// ```
///
/// Create from multiple documents (path required)
/// ```
/// # use tfscan::hcl_documents;
/// hcl_documents! {
///   "variables.tf" => r#"variable "flag" {}"#,
///   "main.tf" => r#"locals { flag = var.flag }"#
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use tfscan::hcl_documents;
/// hcl_documents!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! hcl_documents {
    // single document without source
    { $expr:expr } => {{
        let mut docs = $crate::hcl_documents::HclDocuments::default();
        docs.insert_str($expr, None).expect("body must parse");
        docs
    }};
    // multi document with sources
    { $($source:expr => $expr:expr),+ } => {{
        let mut docs = $crate::hcl_documents::HclDocuments::default();
        $(
            docs.insert_str($expr, Some(::std::path::PathBuf::from($source))).expect("body must parse");
        )+

        docs
    }};
}

pub type Source = Option<PathBuf>;
pub type SourceAttribute<'a> = (usize, &'a SourceFile, &'a Attribute);
pub type SourceBlock<'a> = (usize, &'a SourceFile, &'a Block);

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    #[test]
    fn iterators() {
        let hcl_documents = hcl_documents! {r#"
        attr_1 = 1
        one two {}
        three four five {}
        attr_2 = 2
        attr_3 = 3
        "#};

        assert_eq!(hcl_documents.attributes().count(), 3);
        assert_eq!(hcl_documents.blocks().count(), 2);
    }

    #[test]
    fn line_numbers() {
        let source = SourceFile::new(None, "a\nbb\n\nc");
        assert_eq!(source.line_of(0), 1);
        assert_eq!(source.line_of(2), 2);
        assert_eq!(source.line_of(5), 3);
        assert_eq!(source.line_of(6), 4);
        assert_eq!(source.lines_of(Some(0..4)), (1, 2));
        assert_eq!(source.lines_of(None), (0, 0));
    }
}
