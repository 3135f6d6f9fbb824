//! Forward-only cursor over a PostgreSQL row stream

use super::values::render_column;
use crate::adapters::source::{RowBuffer, RowCursor};
use crate::domain::{Result, SourceError};
use async_trait::async_trait;
use deadpool_postgres::Object;
use futures::TryStreamExt;
use std::pin::Pin;
use tokio_postgres::{Row, RowStream};

/// Cursor holding one pooled connection and its row stream
///
/// The connection returns to the pool when the cursor is closed or dropped.
pub struct PostgresCursor {
    stream: Option<Pin<Box<RowStream>>>,
    current: Option<Row>,
    columns: Vec<String>,
    client: Option<Object>,
}

impl PostgresCursor {
    pub(super) fn new(client: Object, stream: RowStream, columns: Vec<String>) -> Self {
        Self {
            stream: Some(Box::pin(stream)),
            current: None,
            columns,
            client: Some(client),
        }
    }
}

#[async_trait]
impl RowCursor for PostgresCursor {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    async fn next(&mut self) -> Result<bool> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };

        match stream.try_next().await {
            Ok(Some(row)) => {
                self.current = Some(row);
                Ok(true)
            }
            Ok(None) => {
                self.current = None;
                self.stream = None;
                Ok(false)
            }
            Err(e) => {
                self.current = None;
                self.stream = None;
                Err(SourceError::Iteration(e.to_string()).into())
            }
        }
    }

    fn scan(&mut self, row: &mut RowBuffer) -> Result<()> {
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| SourceError::Scan("no current row".to_string()))?;

        row.reset(current.len());
        for idx in 0..current.len() {
            render_column(current, idx, row)?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.current = None;
        self.stream = None;
        self.client = None;
        Ok(())
    }
}
