//! Read-only view of template whitelists and live table columns.

use std::collections::BTreeSet;

use crate::{
    data::Value,
    error::IngestError,
    ident::Identifier,
    store::Store,
};

/// Template rows with this status are part of the whitelist.
pub const ACTIVE_TEMPLATE_STATUS: &str = "Use";

pub struct SchemaRegistry<'a, S: Store + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: Store + ?Sized> SchemaRegistry<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }

    /// Whitelisted column identifiers for a template table. A template table
    /// that does not exist in the store is reported as
    /// [`IngestError::TemplateNotFound`].
    pub fn template_columns(&mut self, template: &Identifier) -> Result<BTreeSet<String>, IngestError> {
        if !self.store.table_exists(template.as_str())? {
            return Err(IngestError::TemplateNotFound {
                name: template.to_string(),
            });
        }
        let sql = format!(
            "SELECT Columns FROM {} WHERE status = ?1",
            template.quoted()
        );
        let rows = self.store.fetch_all(
            &sql,
            &[Some(Value::String(ACTIVE_TEMPLATE_STATUS.to_string()))],
        )?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.into_iter().next().flatten())
            .map(|value| value.as_display().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect())
    }

    pub fn live_columns(&mut self, table: &Identifier) -> Result<BTreeSet<String>, IngestError> {
        Ok(self
            .store
            .column_names(table.as_str())?
            .into_iter()
            .collect())
    }

    pub fn table_exists(&mut self, table: &Identifier) -> Result<bool, IngestError> {
        Ok(self.store.table_exists(table.as_str())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn seeded_store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .execute("CREATE TABLE Sauce1Template (Columns TEXT, status TEXT)", &[])
            .unwrap();
        for (column, status) in [("A", "Use"), ("B", "Use"), ("C", "Ignore"), ("D", "use")] {
            store
                .execute(
                    "INSERT INTO Sauce1Template VALUES (?1, ?2)",
                    &[
                        Some(Value::String(column.into())),
                        Some(Value::String(status.into())),
                    ],
                )
                .unwrap();
        }
        store.commit().unwrap();
        store
    }

    #[test]
    fn template_columns_select_only_active_entries() {
        let mut store = seeded_store();
        let mut registry = SchemaRegistry::new(&mut store);
        let template = Identifier::parse("template", "Sauce1Template").unwrap();
        let columns = registry.template_columns(&template).unwrap();
        assert_eq!(columns.into_iter().collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn missing_template_table_is_a_lookup_failure() {
        let mut store = seeded_store();
        let mut registry = SchemaRegistry::new(&mut store);
        let template = Identifier::parse("template", "Sauce9Template").unwrap();
        let err = registry.template_columns(&template).unwrap_err();
        assert!(matches!(err, IngestError::TemplateNotFound { .. }));
    }

    #[test]
    fn live_columns_are_empty_for_missing_tables() {
        let mut store = seeded_store();
        let mut registry = SchemaRegistry::new(&mut store);
        let table = Identifier::parse("table", "Probate").unwrap();
        assert!(!registry.table_exists(&table).unwrap());
        assert!(registry.live_columns(&table).unwrap().is_empty());
    }
}
