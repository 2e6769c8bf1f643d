use anyhow::Result;
use std::collections::BTreeSet;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, ConstScoreQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, Value, STRING, STORED};
use tantivy::{doc, Index, IndexReader, IndexWriter, TantivyDocument, Term};
use tracing::{debug, info};

use ragdb_core::traits::TextIndexer;
use ragdb_core::types::{Candidate, Chunk, ScoreKind};

use crate::tokenize::{script_aware_analyzer, tokenize, ANALYZER_NAME};

fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_text_field("id", STRING | STORED);
    schema_builder.add_text_field("doc_key", STRING);
    let text_field_indexing = TextFieldIndexing::default()
        .set_tokenizer(ANALYZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    schema_builder.add_text_field("text", TextOptions::default().set_indexing_options(text_field_indexing));
    schema_builder.build()
}

/// In-memory BM25 index over a fixed chunk corpus.
///
/// The corpus is frozen at [`build`](Self::build); chunks that appear later
/// are only searchable after a rebuild.
pub struct LexicalIndex {
    reader: IndexReader,
    id_field: Field,
    doc_key_field: Field,
    text_field: Field,
    docs: usize,
}

impl LexicalIndex {
    pub fn build(chunks: &[Chunk]) -> Result<Self> {
        let schema = build_schema();
        let index = Index::create_in_ram(schema.clone());
        index.tokenizers().register(ANALYZER_NAME, script_aware_analyzer());
        let id_field = schema.get_field("id")?;
        let doc_key_field = schema.get_field("doc_key")?;
        let text_field = schema.get_field("text")?;

        let mut writer: IndexWriter = index.writer_with_num_threads(1, 50_000_000)?;
        for c in chunks {
            writer.add_document(doc!(
                id_field => c.id.clone(),
                doc_key_field => c.doc_key.clone(),
                text_field => c.text.clone(),
            ))?;
        }
        writer.commit()?;
        let reader = index.reader()?;
        reader.reload()?;
        info!(chunks = chunks.len(), "built lexical index");
        Ok(Self { reader, id_field, doc_key_field, text_field, docs: chunks.len() })
    }

    pub fn len(&self) -> usize {
        self.docs
    }

    pub fn is_empty(&self) -> bool {
        self.docs == 0
    }

    /// Up to `k` chunks with a strictly positive BM25 score, best first.
    /// `scope` keeps only chunks of that document key and leaves scores as they are.
    pub fn search(&self, query: &str, k: usize, scope: Option<&str>) -> Result<Vec<Candidate>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let terms: BTreeSet<String> = tokenize(query).into_iter().collect();
        if terms.is_empty() {
            debug!(query, "query has no indexable terms");
            return Ok(Vec::new());
        }
        let should: Vec<(Occur, Box<dyn Query>)> = terms
            .iter()
            .map(|t| {
                let q = TermQuery::new(Term::from_field_text(self.text_field, t), IndexRecordOption::WithFreqs);
                (Occur::Should, Box::new(q) as Box<dyn Query>)
            })
            .collect();
        let mut query_obj: Box<dyn Query> = Box::new(BooleanQuery::new(should));
        if let Some(key) = scope {
            let filter = TermQuery::new(Term::from_field_text(self.doc_key_field, key), IndexRecordOption::Basic);
            let scoped: Box<dyn Query> = Box::new(ConstScoreQuery::new(Box::new(filter), 0.0));
            query_obj = Box::new(BooleanQuery::new(vec![(Occur::Must, query_obj), (Occur::Must, scoped)]));
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(query_obj.as_ref(), &TopDocs::with_limit(k))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            if score <= 0.0 {
                continue;
            }
            let doc: TantivyDocument = searcher.doc(addr)?;
            if let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) {
                hits.push(Candidate::new(id, score, ScoreKind::Lexical));
            }
        }
        debug!(query, scope, hits = hits.len(), "lexical search");
        Ok(hits)
    }
}

impl TextIndexer for LexicalIndex {
    fn search(&self, query: &str, k: usize, scope: Option<&str>) -> anyhow::Result<Vec<Candidate>> {
        LexicalIndex::search(self, query, k, scope)
    }
}
