//! 通用工具函数
//!
//! 动态值（`serde_json::Value`）的形状判断，以及数组/对象的统一遍历。
//! 依赖注解（`$inject`）和模块清单的校验都基于这里的判断。

use serde_json::Value;
use std::fmt;

use crate::errors::ShapeError;

pub fn is_string(value: &Value) -> bool {
    value.is_string()
}

pub fn is_object(value: &Value) -> bool {
    value.is_object()
}

pub fn is_array(value: &Value) -> bool {
    value.is_array()
}

pub fn is_boolean(value: &Value) -> bool {
    value.is_boolean()
}

pub fn is_number(value: &Value) -> bool {
    value.is_number()
}

/// 缺失的值与 `null` 同等看待
pub fn is_undefined_or_null(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// 返回值的形状名称，用于错误信息
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 遍历时传给回调的位置信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    /// 数组下标
    Index(usize),
    /// 对象键
    Name(&'a str),
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "#{}", index),
            Key::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// 遍历数组（按下标）或对象（按插入顺序）
///
/// 其他形状返回 `ShapeError::NotIterable`，回调不会被调用。
pub fn for_each<'a, F>(value: &'a Value, mut callback: F) -> Result<(), ShapeError>
where
    F: FnMut(&'a Value, Key<'a>),
{
    match value {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                callback(item, Key::Index(index));
            }
            Ok(())
        }
        Value::Object(map) => {
            for (key, item) in map {
                callback(item, Key::Name(key));
            }
            Ok(())
        }
        other => Err(ShapeError::NotIterable {
            found: kind_of(other),
        }),
    }
}
