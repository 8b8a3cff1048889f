//! sqlx `PgPool` adapters for the capability traits.
//!
//! [`ExecuteScript`] runs the rendered script as a single batch through
//! `sqlx::raw_sql`. [`IntrospectSchema`] rebuilds a [`Schema`] value from
//! the `information_schema` views and the `pg_constraint`/`pg_enum`
//! catalogs, restricted to the `public` schema.

use std::collections::BTreeMap;

use tracing::debug;

use crate::migration::{ExecuteScript, IntrospectSchema};
use crate::schema::{
    Column, ColumnName, ColumnType, ConstraintName, Enumeration, ReferentialAction, Schema, Table,
    TableConstraint, TableName,
};

impl ExecuteScript for sqlx::PgPool {
    async fn execute_script(&self, sql: &str) -> sqlx::Result<()> {
        sqlx::raw_sql(sql).execute(self).await?;
        Ok(())
    }
}

impl IntrospectSchema for sqlx::PgPool {
    async fn introspect_schema(&self) -> sqlx::Result<Schema> {
        let enum_rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT t.typname::text, e.enumlabel::text \
             FROM pg_type t JOIN pg_enum e ON e.enumtypid = t.oid \
             ORDER BY t.typname, e.enumsortorder",
        )
        .fetch_all(self)
        .await?;

        let column_rows: Vec<ColumnRow> = sqlx::query_as(
            "SELECT table_name::text, column_name::text, data_type::text, udt_name::text, \
                    character_maximum_length::int, numeric_precision::int, numeric_scale::int, \
                    datetime_precision::int, is_nullable::text, column_default::text \
             FROM information_schema.columns \
             WHERE table_schema = 'public' \
             ORDER BY table_name, ordinal_position",
        )
        .fetch_all(self)
        .await?;

        let key_rows: Vec<KeyRow> = sqlx::query_as(
            "SELECT tc.table_name::text, tc.constraint_name::text, tc.constraint_type::text, \
                    kcu.column_name::text \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON kcu.constraint_name = tc.constraint_name \
              AND kcu.table_schema = tc.table_schema \
             WHERE tc.table_schema = 'public' \
               AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE') \
             ORDER BY tc.table_name, tc.constraint_name, kcu.ordinal_position",
        )
        .fetch_all(self)
        .await?;

        // Foreign keys come from pg_constraint directly: unnesting conkey
        // and confkey together keeps the local/referenced pairing
        // positional, which information_schema.constraint_column_usage
        // cannot guarantee for composite keys.
        let fk_rows: Vec<ForeignKeyRow> = sqlx::query_as(
            "SELECT rel.relname::text, con.conname::text, frel.relname::text, \
                    att.attname::text, fatt.attname::text, \
                    con.confdeltype::text, con.confupdtype::text \
             FROM pg_constraint con \
             JOIN pg_class rel ON rel.oid = con.conrelid \
             JOIN pg_class frel ON frel.oid = con.confrelid \
             JOIN pg_namespace nsp ON nsp.oid = con.connamespace \
             CROSS JOIN LATERAL unnest(con.conkey, con.confkey) \
                  WITH ORDINALITY AS cols(attnum, fattnum, ord) \
             JOIN pg_attribute att \
               ON att.attrelid = con.conrelid AND att.attnum = cols.attnum \
             JOIN pg_attribute fatt \
               ON fatt.attrelid = con.confrelid AND fatt.attnum = cols.fattnum \
             WHERE con.contype = 'f' AND nsp.nspname = 'public' \
             ORDER BY rel.relname, con.conname, cols.ord",
        )
        .fetch_all(self)
        .await?;

        let schema = assemble(enum_rows, column_rows, key_rows, fk_rows);
        debug!(tables = schema.tables.len(), "introspection complete");
        Ok(schema)
    }
}

type ColumnRow = (
    String,         // table name
    String,         // column name
    String,         // data_type
    String,         // udt_name
    Option<i32>,    // character_maximum_length
    Option<i32>,    // numeric_precision
    Option<i32>,    // numeric_scale
    Option<i32>,    // datetime_precision
    String,         // is_nullable
    Option<String>, // column_default
);

type KeyRow = (
    String, // table name
    String, // constraint name
    String, // constraint type
    String, // column, in ordinal position order
);

type ForeignKeyRow = (
    String, // table name
    String, // constraint name
    String, // referenced table
    String, // local column
    String, // referenced column, paired with the local one
    String, // confdeltype code
    String, // confupdtype code
);

/// Builds a [`Schema`] from raw catalog rows.
fn assemble(
    enum_rows: Vec<(String, String)>,
    column_rows: Vec<ColumnRow>,
    key_rows: Vec<KeyRow>,
    fk_rows: Vec<ForeignKeyRow>,
) -> Schema {
    let mut schema = Schema::new();

    for (type_name, label) in enum_rows {
        schema
            .enums
            .entry(type_name.into())
            .or_insert_with(Enumeration::default)
            .labels
            .push(label);
    }
    let enum_names: Vec<String> = schema.enums.keys().map(|n| n.as_str().to_string()).collect();

    for (table, column, data_type, udt, char_len, precision, scale, dt_precision, nullable, default) in
        column_rows
    {
        let column_type = type_from_catalog(
            &data_type,
            &udt,
            char_len,
            precision,
            scale,
            dt_precision,
            &enum_names,
        );
        let mut definition = Column::new(column_type);
        if nullable == "NO" {
            definition = definition.not_null();
        }
        if let Some(expr) = default {
            definition = definition.default_expr(expr);
        }
        schema
            .tables
            .entry(table.into())
            .or_insert_with(Table::new)
            .columns
            .insert(column.into(), definition);
    }

    let mut keys: BTreeMap<(TableName, String), (String, Vec<ColumnName>)> = BTreeMap::new();
    for (table, name, kind, column) in key_rows {
        keys.entry((table.into(), name))
            .or_insert_with(|| (kind, Vec::new()))
            .1
            .push(column.into());
    }
    for ((table, name), (kind, columns)) in keys {
        let name = ConstraintName::new(name);
        let constraint = match kind.as_str() {
            "PRIMARY KEY" => TableConstraint::PrimaryKey { name, columns },
            _ => TableConstraint::Unique { name, columns },
        };
        schema
            .tables
            .entry(table)
            .or_insert_with(Table::new)
            .constraints
            .insert(constraint);
    }

    // Each row carries one (local, referenced) pair already in key order.
    let mut foreign_keys: BTreeMap<(TableName, String), ForeignKeyGroup> = BTreeMap::new();
    for (table, name, referenced, local, referenced_column, delete_code, update_code) in fk_rows {
        foreign_keys
            .entry((table.into(), name))
            .or_insert_with(|| ForeignKeyGroup {
                referenced_table: referenced.into(),
                columns: Vec::new(),
                on_delete: referential_action(&delete_code),
                on_update: referential_action(&update_code),
            })
            .columns
            .push((local.into(), referenced_column.into()));
    }
    for ((table, name), group) in foreign_keys {
        schema
            .tables
            .entry(table)
            .or_insert_with(Table::new)
            .constraints
            .insert(TableConstraint::ForeignKey {
                name: ConstraintName::new(name),
                referenced_table: group.referenced_table,
                columns: group.columns,
                on_delete: group.on_delete,
                on_update: group.on_update,
            });
    }

    schema
}

struct ForeignKeyGroup {
    referenced_table: TableName,
    columns: Vec<(ColumnName, ColumnName)>,
    on_delete: ReferentialAction,
    on_update: ReferentialAction,
}

/// Maps a `pg_constraint.confdeltype`/`confupdtype` code to an action.
fn referential_action(code: &str) -> ReferentialAction {
    match code {
        "c" => ReferentialAction::Cascade,
        "r" => ReferentialAction::Restrict,
        "n" => ReferentialAction::SetNull,
        "d" => ReferentialAction::SetDefault,
        _ => ReferentialAction::NoAction,
    }
}

/// Maps an `information_schema` type description back into a
/// [`ColumnType`].
///
/// PostgreSQL reports a datetime precision of 6 for bare `TIME` and
/// `TIMESTAMP` columns; that default is normalized away so it compares
/// equal to a desired type declared without precision. Unknown and
/// user-defined non-enum types come back as [`ColumnType::Domain`], which
/// round-trips as an opaque named type.
#[allow(clippy::too_many_arguments)]
fn type_from_catalog(
    data_type: &str,
    udt: &str,
    char_len: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
    dt_precision: Option<i32>,
    enum_names: &[String],
) -> ColumnType {
    let length = |v: Option<i32>| v.and_then(|n| u32::try_from(n).ok());
    let datetime_precision = match dt_precision {
        Some(6) | None => None,
        Some(p) => u32::try_from(p).ok(),
    };

    match data_type {
        "smallint" => ColumnType::SmallInt,
        "integer" => ColumnType::Integer,
        "bigint" => ColumnType::BigInt,
        "real" => ColumnType::Real,
        "double precision" => ColumnType::DoublePrecision,
        "numeric" => ColumnType::Numeric {
            precision: length(precision),
            scale: length(scale),
        },
        "character" => ColumnType::Char {
            length: length(char_len),
            character_set: None,
        },
        "character varying" => ColumnType::VarChar {
            length: length(char_len),
            character_set: None,
        },
        "bit" => ColumnType::Bit {
            length: length(char_len),
        },
        "bit varying" => ColumnType::VarBit {
            length: length(char_len),
        },
        "boolean" => ColumnType::Boolean,
        "date" => ColumnType::Date,
        "time without time zone" => ColumnType::Time {
            precision: datetime_precision,
            with_time_zone: false,
        },
        "time with time zone" => ColumnType::Time {
            precision: datetime_precision,
            with_time_zone: true,
        },
        "timestamp without time zone" => ColumnType::Timestamp {
            precision: datetime_precision,
            with_time_zone: false,
        },
        "timestamp with time zone" => ColumnType::Timestamp {
            precision: datetime_precision,
            with_time_zone: true,
        },
        "interval" => ColumnType::Interval,
        "json" => ColumnType::Json,
        "jsonb" => ColumnType::Jsonb,
        "bytea" => ColumnType::BinaryLargeObject,
        "ARRAY" => ColumnType::Array,
        _ => match udt {
            "int4range" => ColumnType::Int4Range,
            "int8range" => ColumnType::Int8Range,
            "numrange" => ColumnType::NumRange,
            "tsrange" => ColumnType::TsRange,
            "tstzrange" => ColumnType::TsTzRange,
            "daterange" => ColumnType::DateRange,
            name if enum_names.iter().any(|e| e == name) => {
                ColumnType::Enumeration(name.into())
            }
            name => ColumnType::Domain(name.to_string()),
        },
    }
}
