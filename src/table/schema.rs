use crate::table::Table;
use crate::table::Value;
use serde::Serialize;

/// Inferred type of a column, used for display hints only.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Varchar,
}

impl ColumnType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "boolean",
            ColumnType::BigInt => "bigint",
            ColumnType::Double => "double",
            ColumnType::Varchar => "varchar",
        }
    }

    /// Type of a single value; `None` for nulls, which fit any column.
    pub(crate) fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::Number(number) if number.fract() == 0.0 => Some(ColumnType::BigInt),
            Value::Number(_) => Some(ColumnType::Double),
            Value::String(_) => Some(ColumnType::Varchar),
            Value::Null => None,
        }
    }

    /// Most specific type shared by all candidates; `Varchar` when empty or mixed.
    pub(crate) fn detect<I: IntoIterator<Item = Option<ColumnType>>>(types: I) -> ColumnType {
        let types: Vec<ColumnType> = types.into_iter().flatten().collect();
        if types.is_empty() {
            ColumnType::Varchar
        } else if types.iter().all(|kind| *kind == ColumnType::Boolean) {
            ColumnType::Boolean
        } else if types.iter().all(|kind| *kind == ColumnType::BigInt) {
            ColumnType::BigInt
        } else if types.iter().all(ColumnType::is_numeric) {
            ColumnType::Double
        } else {
            ColumnType::Varchar
        }
    }

    #[inline]
    fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::BigInt | ColumnType::Double)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
}

/// Ordered column names of a sheet with their inferred types.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn infer(table: &Table) -> Schema {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .map(|(index, name)| Column {
                name: name.to_owned(),
                kind: ColumnType::detect(
                    table
                        .rows()
                        .iter()
                        .map(|row| row.get(index).and_then(ColumnType::of)),
                ),
            })
            .collect();
        Schema { columns }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_most_specific_type() {
        assert_eq!(ColumnType::detect([]), ColumnType::Varchar);
        assert_eq!(ColumnType::detect([None, None]), ColumnType::Varchar);
        assert_eq!(ColumnType::detect([Some(ColumnType::BigInt), None]), ColumnType::BigInt);
        assert_eq!(ColumnType::detect([Some(ColumnType::BigInt), Some(ColumnType::Double)]), ColumnType::Double);
        assert_eq!(ColumnType::detect([Some(ColumnType::Boolean), Some(ColumnType::BigInt)]), ColumnType::Varchar);
    }

    #[test]
    fn infers_schema_from_table() {
        let table = Table::new(
            vec!["Name".to_owned(), "Age".to_owned(), "Score".to_owned(), "Note".to_owned()],
            vec![
                vec![Value::from("Alice"), Value::Number(30.0), Value::Number(1.5), Value::Null],
                vec![Value::from("Bob"), Value::Number(25.0), Value::Number(2.0), Value::Null],
            ],
        );
        let schema = Schema::infer(&table);
        let kinds: Vec<&str> = schema.columns.iter().map(|column| column.kind.as_str()).collect();
        assert_eq!(kinds, vec!["varchar", "bigint", "double", "varchar"]);
        assert_eq!(schema.column("Age").map(|column| column.kind), Some(ColumnType::BigInt));
    }
}
