use color_eyre::{eyre::OptionExt, Result};
use libsql::params::IntoParams;

/// Maps a result row onto a model, reading columns by position.
pub trait FromRow: Sized {
    fn from_row(row: &libsql::Row) -> Result<Self>;
}

/// Start a transaction that takes the write lock up front, so a busy
/// database is waited on rather than failing halfway through.
pub async fn begin_write(conn: &libsql::Connection) -> Result<libsql::Transaction> {
    Ok(conn
        .transaction_with_behavior(libsql::TransactionBehavior::Immediate)
        .await?)
}

/// Fetch all rows and map each into `T`.
pub async fn query_all<T: FromRow>(
    conn: &libsql::Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Vec<T>> {
    let mut rows = conn.query(sql, params).await?;
    let mut results = Vec::new();
    while let Some(row) = rows.next().await? {
        results.push(T::from_row(&row)?);
    }
    Ok(results)
}

/// Fetch the first row and map into `T`. Errors if no rows returned.
pub async fn query_one<T: FromRow>(
    conn: &libsql::Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<T> {
    let row = conn
        .query(sql, params)
        .await?
        .next()
        .await?
        .ok_or_eyre("expected a row but got none")?;
    T::from_row(&row)
}

/// Fetch the first row and map into `T`, or return `None` if no rows.
pub async fn query_optional<T: FromRow>(
    conn: &libsql::Connection,
    sql: &str,
    params: impl IntoParams,
) -> Result<Option<T>> {
    match conn.query(sql, params).await?.next().await? {
        Some(row) => Ok(Some(T::from_row(&row)?)),
        None => Ok(None),
    }
}

macro_rules! scalar_from_row {
    ($($ty:ty),*) => {
        $(
            impl FromRow for $ty {
                fn from_row(row: &libsql::Row) -> Result<Self> {
                    Ok(row.get::<$ty>(0)?)
                }
            }
        )*
    };
}

// Single-column queries (counts, ids, averages) map straight onto the value.
scalar_from_row!(i64, f64, bool, String, Option<i64>, Option<f64>);

/// Read a text column and parse it into one of the string-backed enums.
pub fn get_enum<T>(row: &libsql::Row, idx: i32) -> Result<T>
where
    T: std::str::FromStr<Err = color_eyre::Report>,
{
    row.get::<String>(idx)?.parse()
}
