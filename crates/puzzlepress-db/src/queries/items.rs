use puzzlepress_types::models::{Item, NewItem};
use rusqlite::{Connection, Row, ToSql};

use super::{now, time_at};
use crate::{Database, DbResult};

const ITEM_SELECT: &str = "SELECT id, model, name, description, created_at FROM items";

impl Database {
    pub fn get_all_items(&self) -> DbResult<Vec<Item>> {
        self.with_conn(|conn| query_items(conn, &format!("{ITEM_SELECT} ORDER BY model, id"), &[]))
    }

    pub fn get_items_by_model(&self, model: &str) -> DbResult<Vec<Item>> {
        self.with_conn(|conn| {
            query_items(conn, &format!("{ITEM_SELECT} WHERE model = ?1 ORDER BY id"), &[&model])
        })
    }

    /// Case-insensitive substring match on the model name. `%` and `_` in the
    /// input match literally.
    pub fn search_items_by_model(&self, fragment: &str) -> DbResult<Vec<Item>> {
        let pattern = format!("%{}%", escape_like(fragment));
        self.with_conn(|conn| {
            query_items(
                conn,
                &format!("{ITEM_SELECT} WHERE model LIKE ?1 ESCAPE '\\' ORDER BY model, id"),
                &[&pattern],
            )
        })
    }

    pub fn create_item(&self, new: &NewItem) -> DbResult<Item> {
        self.with_conn(|conn| {
            let item = conn.query_row(
                "INSERT INTO items (model, name, description, created_at) VALUES (?1, ?2, ?3, ?4)
                 RETURNING id, model, name, description, created_at",
                (&new.model, &new.name, &new.description, now()),
                map_item,
            )?;
            Ok(item)
        })
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn query_items(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> DbResult<Vec<Item>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_item)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        model: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: time_at(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;

    fn item(db: &Database, model: &str, name: &str) -> Item {
        db.create_item(&NewItem {
            model: model.to_string(),
            name: name.to_string(),
            description: None,
        })
        .unwrap()
    }

    #[test]
    fn exact_model_lookup() {
        let db = fixtures::db();
        item(&db, "X-100", "Lamp");
        item(&db, "X-100", "Shade");
        item(&db, "X-1000", "Bulb");

        let found = db.get_items_by_model("X-100").unwrap();
        assert_eq!(found.len(), 2);
        assert!(db.get_items_by_model("x-100").unwrap().is_empty());
        assert_eq!(db.get_all_items().unwrap().len(), 3);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let db = fixtures::db();
        item(&db, "Falcon-9", "Rocket");
        item(&db, "falcon heavy", "Bigger rocket");
        item(&db, "Dragon", "Capsule");

        let names: Vec<_> = db
            .search_items_by_model("FALCON")
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, ["Rocket", "Bigger rocket"]);
    }

    #[test]
    fn search_wildcards_are_literal() {
        let db = fixtures::db();
        item(&db, "50%_off", "Sale");
        item(&db, "500ff", "Not a sale");

        let found = db.search_items_by_model("0%_").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Sale");
    }

    #[test]
    fn same_model_and_name_is_a_conflict() {
        let db = fixtures::db();
        item(&db, "X", "Lamp");
        let err = db
            .create_item(&NewItem { model: "X".into(), name: "Lamp".into(), description: None })
            .unwrap_err();
        assert!(err.is_conflict_on("name"));
    }
}
