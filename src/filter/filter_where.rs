use serde_json::Value;

use super::error::FilterError;
use super::types::{Condition, FilterOp, FilterWhereInfo};
use super::validate_field_name;

/// Compiles Mongo-style WHERE objects into a `Condition` tree and from there into
/// SQL over the `body` JSONB column of the documents table.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Parse and compile in one step. Placeholders start after `starting_param_index`.
    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<Value>), FilterError> {
        let condition = Self::parse(where_data)?;
        Self::new(starting_param_index).compile(&condition)
    }

    /// Compile an already parsed tree, draining the collected parameters
    pub fn compile(&mut self, condition: &Condition) -> Result<(String, Vec<Value>), FilterError> {
        let sql = self.build_sql(condition)?;
        Ok((sql, std::mem::take(&mut self.param_values)))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        Self::parse(where_data).map(|_| ())
    }

    pub fn parse(where_data: &Value) -> Result<Condition, FilterError> {
        match where_data {
            Value::Null => Ok(Condition::All(vec![])),
            Value::Object(obj) => {
                let mut conditions = Vec::with_capacity(obj.len());
                for (key, value) in obj {
                    if key.starts_with('$') {
                        conditions.push(Self::parse_logical_operator(key, value)?);
                    } else {
                        conditions.extend(Self::parse_field_condition(key, value)?);
                    }
                }
                Ok(Condition::All(conditions))
            }
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Condition, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let parts = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { Condition::All(parts) } else { Condition::Any(parts) })
            }
            "$not" => Ok(Condition::Not(Box::new(Self::parse(value)?))),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Condition>, FilterError> {
        validate_field_name(field)?;

        match value {
            Value::Object(obj) if obj.keys().all(|k| k.starts_with('$')) && !obj.is_empty() => {
                let mut out = Vec::with_capacity(obj.len());
                for (op_key, op_val) in obj {
                    let operator = Self::map_operator(op_key)?;
                    if matches!(operator, FilterOp::In | FilterOp::NIn) && !op_val.is_array() {
                        return Err(FilterError::InvalidOperatorData(format!("{} requires array", op_key)));
                    }
                    out.push(Condition::Field(FilterWhereInfo {
                        field: field.to_string(),
                        operator,
                        data: op_val.clone(),
                    }));
                }
                Ok(out)
            }
            // Implicit equality: { field: value }
            _ => Ok(vec![Condition::Field(FilterWhereInfo {
                field: field.to_string(),
                operator: FilterOp::Eq,
                data: value.clone(),
            })]),
        }
    }

    fn map_operator(op_key: &str) -> Result<FilterOp, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }

    fn build_sql(&mut self, condition: &Condition) -> Result<String, FilterError> {
        match condition {
            Condition::All(parts) => self.join(parts, " AND ", "1=1"),
            Condition::Any(parts) => self.join(parts, " OR ", "1=0"),
            Condition::Not(inner) => Ok(format!("NOT ({})", self.build_sql(inner)?)),
            Condition::Field(info) => self.build_field_sql(info),
        }
    }

    fn join(&mut self, parts: &[Condition], joiner: &str, empty: &str) -> Result<String, FilterError> {
        if parts.is_empty() {
            return Ok(empty.to_string());
        }
        let sql = parts
            .iter()
            .map(|part| self.build_sql(part).map(|s| format!("({})", s)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sql.join(joiner))
    }

    fn build_field_sql(&mut self, info: &FilterWhereInfo) -> Result<String, FilterError> {
        let column = format!("body->'{}'", info.field);
        let sql = match info.operator {
            FilterOp::Eq if info.data.is_null() => {
                format!("({column} IS NULL OR {column} = 'null'::jsonb)")
            }
            FilterOp::Eq => format!("{} = {}", column, self.param(info.data.clone())),
            FilterOp::Ne if info.data.is_null() => {
                format!("({column} IS NOT NULL AND {column} <> 'null'::jsonb)")
            }
            FilterOp::Ne => {
                let p = self.param(info.data.clone());
                format!("({column} IS NULL OR {column} <> {p})")
            }
            FilterOp::Gt => format!("{} > {}", column, self.param(info.data.clone())),
            FilterOp::Gte => format!("{} >= {}", column, self.param(info.data.clone())),
            FilterOp::Lt => format!("{} < {}", column, self.param(info.data.clone())),
            FilterOp::Lte => format!("{} <= {}", column, self.param(info.data.clone())),
            FilterOp::In | FilterOp::NIn => {
                let values = info.data.as_array().cloned().unwrap_or_default();
                let negate = info.operator == FilterOp::NIn;
                if values.is_empty() {
                    return Ok(if negate { "1=1" } else { "1=0" }.to_string());
                }
                let params: Vec<String> = values.into_iter().map(|v| self.param(v)).collect();
                if negate {
                    format!("({column} IS NULL OR {column} NOT IN ({}))", params.join(", "))
                } else {
                    format!("{} IN ({})", column, params.join(", "))
                }
            }
        };
        Ok(sql)
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}
