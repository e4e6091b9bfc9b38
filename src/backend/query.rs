use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    IsNull(String),
    In(String, Vec<Value>),
    /// Any of the columns contains the term, ignoring case.
    AnyContains(Vec<String>, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A filtered, ordered read against one table of the backend.
#[derive(Debug, Clone)]
pub struct Query {
    pub table: &'static str,
    pub filters: Vec<Filter>,
    pub order: Option<(String, Order)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Query {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }

    pub fn eq(mut self, column: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.filters.push(Filter::Eq(column.to_string(), value));
        self
    }

    pub fn is_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::IsNull(column.to_string()));
        self
    }

    pub fn in_list<T: Serialize>(mut self, column: &str, values: impl IntoIterator<Item = T>) -> Self {
        let values = values
            .into_iter()
            .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
            .collect();
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    /// Substring search over `columns`. Blank terms add no filter.
    pub fn search(mut self, columns: &[&str], term: &str) -> Self {
        let term = sanitize_term(term);
        if !term.is_empty() {
            self.filters.push(Filter::AnyContains(
                columns.iter().map(|c| c.to_string()).collect(),
                term,
            ));
        }
        self
    }

    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        self.offset = Some(n);
        self
    }

    /// PostgREST query-string pairs for filters, ordering and paging.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 3);
        for f in &self.filters {
            match f {
                Filter::Eq(col, v) => params.push((col.clone(), format!("eq.{}", scalar(v)))),
                Filter::IsNull(col) => params.push((col.clone(), "is.null".into())),
                Filter::In(col, vs) => {
                    let list = vs
                        .iter()
                        .map(|v| format!("\"{}\"", scalar(v)))
                        .collect::<Vec<_>>()
                        .join(",");
                    params.push((col.clone(), format!("in.({list})")));
                }
                Filter::AnyContains(cols, term) => {
                    let alts = cols
                        .iter()
                        .map(|c| format!("{c}.ilike.\"*{term}*\""))
                        .collect::<Vec<_>>()
                        .join(",");
                    params.push(("or".into(), format!("({alts})")));
                }
            }
        }
        if let Some((col, order)) = &self.order {
            let dir = match order {
                Order::Asc => "asc",
                Order::Desc => "desc",
            };
            params.push(("order".into(), format!("{col}.{dir}")));
        }
        if let Some(n) = self.limit {
            params.push(("limit".into(), n.to_string()));
        }
        if let Some(n) = self.offset {
            params.push(("offset".into(), n.to_string()));
        }
        params
    }

    /// Evaluates the filters against a row the way the REST surface would.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| match f {
            Filter::Eq(col, v) => row.get(col) == Some(v),
            Filter::IsNull(col) => row.get(col).map_or(true, Value::is_null),
            Filter::In(col, vs) => row.get(col).is_some_and(|x| vs.contains(x)),
            Filter::AnyContains(cols, term) => {
                let needle = term.to_lowercase();
                cols.iter().any(|c| {
                    row.get(c)
                        .and_then(Value::as_str)
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
                })
            }
        })
    }

    /// Applies ordering and paging to rows that already passed [`Query::matches`].
    pub fn arrange(&self, mut rows: Vec<Value>) -> Vec<Value> {
        if let Some((col, order)) = &self.order {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(col), b.get(col));
                match order {
                    Order::Asc => ord,
                    Order::Desc => ord.reverse(),
                }
            });
        }
        rows.into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// Characters with meaning inside a PostgREST `or=(...)` group or an ilike pattern.
fn sanitize_term(term: &str) -> String {
    term.chars()
        .filter(|c| !matches!(c, '"' | '\\' | '*' | '%' | '_' | '(' | ')' | ','))
        .collect::<String>()
        .trim()
        .to_string()
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
