//! 依赖声明
//!
//! 构造函数的依赖可以有三种写法：
//! - `Plain`：不带依赖的工厂（或由 `resolve` 的显式依赖列表提供）
//! - `Positional`：`[dep1, dep2, factory]`，最后一个元素必须是工厂
//! - `Annotated`：工厂附带一个动态的 `$inject` 依赖数组
//!
//! 注册时统一规范化为 `Injectable`，之后不再变化。

use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::module_object::Instance;
use crate::errors::{BoxError, InjectorError, Result};
use crate::utils;

type FactoryFn<R> = dyn Fn(&Dependencies) -> std::result::Result<R, BoxError> + Send + Sync;

/// 类型化的工厂函数
pub struct Factory<R>(Arc<FactoryFn<R>>);

impl<R: 'static> Factory<R> {
    pub fn new<T, F>(factory: F) -> Self
    where
        F: Fn(&Dependencies) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
        T: Into<R> + 'static,
    {
        Self(Arc::new(move |deps| factory(deps).map(Into::into)))
    }
}

impl<R> Factory<R> {
    fn call(&self, deps: &Dependencies) -> std::result::Result<R, BoxError> {
        (self.0)(deps)
    }
}

impl<R> Clone for Factory<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R> fmt::Debug for Factory<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Factory(..)")
    }
}

/// 位置式声明中的一个元素
#[derive(Debug)]
pub enum Element<R> {
    Name(String),
    Factory(Factory<R>),
}

impl<R> Clone for Element<R> {
    fn clone(&self) -> Self {
        match self {
            Element::Name(name) => Element::Name(name.clone()),
            Element::Factory(factory) => Element::Factory(factory.clone()),
        }
    }
}

impl<R> From<&str> for Element<R> {
    fn from(name: &str) -> Self {
        Element::Name(name.to_string())
    }
}

impl<R> From<String> for Element<R> {
    fn from(name: String) -> Self {
        Element::Name(name)
    }
}

impl<R> From<Factory<R>> for Element<R> {
    fn from(factory: Factory<R>) -> Self {
        Element::Factory(factory)
    }
}

/// 依赖声明
#[derive(Debug)]
pub enum Declaration<R> {
    Plain(Factory<R>),
    Positional(Vec<Element<R>>),
    Annotated { factory: Factory<R>, inject: Value },
}

impl<R> Clone for Declaration<R> {
    fn clone(&self) -> Self {
        match self {
            Declaration::Plain(factory) => Declaration::Plain(factory.clone()),
            Declaration::Positional(elements) => Declaration::Positional(elements.clone()),
            Declaration::Annotated { factory, inject } => Declaration::Annotated {
                factory: factory.clone(),
                inject: inject.clone(),
            },
        }
    }
}

impl<R: 'static> Declaration<R> {
    pub fn plain<T, F>(factory: F) -> Self
    where
        F: Fn(&Dependencies) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
        T: Into<R> + 'static,
    {
        Declaration::Plain(Factory::new(factory))
    }

    /// `[names.., factory]`
    pub fn positional<I, S, T, F>(names: I, factory: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Dependencies) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
        T: Into<R> + 'static,
    {
        let mut elements: Vec<Element<R>> = names
            .into_iter()
            .map(|name| Element::Name(name.into()))
            .collect();
        elements.push(Element::Factory(Factory::new(factory)));
        Declaration::Positional(elements)
    }

    /// 工厂附带 `$inject` 注解
    pub fn annotated<T, F>(inject: Value, factory: F) -> Self
    where
        F: Fn(&Dependencies) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
        T: Into<R> + 'static,
    {
        Declaration::Annotated {
            factory: Factory::new(factory),
            inject,
        }
    }

    /// 直接使用元素序列，形状在注册时校验
    pub fn from_elements(elements: Vec<Element<R>>) -> Self {
        Declaration::Positional(elements)
    }
}

/// 规范化后的构造器：有序依赖名 + 工厂
#[derive(Debug)]
pub struct Injectable<R> {
    dependencies: Vec<String>,
    factory: Factory<R>,
}

impl<R> Clone for Injectable<R> {
    fn clone(&self) -> Self {
        Self {
            dependencies: self.dependencies.clone(),
            factory: self.factory.clone(),
        }
    }
}

impl<R> Injectable<R> {
    pub(crate) fn without_dependencies(factory: Factory<R>) -> Self {
        Self {
            dependencies: Vec::new(),
            factory,
        }
    }

    /// 校验并规范化声明
    ///
    /// `explicit` 只作用于 `Plain` 声明；另外两种写法自带依赖列表。
    pub fn parse(owner: &str, declaration: &Declaration<R>, explicit: &[&str]) -> Result<Self> {
        match declaration {
            Declaration::Plain(factory) => {
                let dependencies = explicit
                    .iter()
                    .enumerate()
                    .map(|(position, name)| check_name(owner, position, name))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self {
                    dependencies,
                    factory: factory.clone(),
                })
            }
            Declaration::Positional(elements) => {
                let (last, names) = elements
                    .split_last()
                    .ok_or_else(|| InjectorError::NotAFunction {
                        owner: owner.to_string(),
                    })?;
                let factory = match last {
                    Element::Factory(factory) => factory.clone(),
                    Element::Name(_) => {
                        return Err(InjectorError::NotAFunction {
                            owner: owner.to_string(),
                        })
                    }
                };
                let dependencies = names
                    .iter()
                    .enumerate()
                    .map(|(position, element)| match element {
                        Element::Name(name) => check_name(owner, position, name),
                        Element::Factory(_) => Err(InjectorError::InvalidDependency {
                            owner: owner.to_string(),
                            position,
                            reason: "found a factory function".to_string(),
                        }),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self {
                    dependencies,
                    factory,
                })
            }
            Declaration::Annotated { factory, inject } => Ok(Self {
                dependencies: parse_annotation(owner, inject)?,
                factory: factory.clone(),
            }),
        }
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// 调用工厂
    pub(crate) fn invoke(&self, owner: &str, deps: &Dependencies) -> Result<R> {
        self.factory
            .call(deps)
            .map_err(|error| InjectorError::from_factory(owner, error))
    }
}

fn check_name(owner: &str, position: usize, name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(InjectorError::InvalidDependency {
            owner: owner.to_string(),
            position,
            reason: "empty name".to_string(),
        });
    }
    Ok(name.to_string())
}

fn parse_annotation(owner: &str, inject: &Value) -> Result<Vec<String>> {
    let invalid = |reason: String| InjectorError::InvalidInjectAnnotation {
        owner: owner.to_string(),
        reason,
    };

    if !utils::is_array(inject) {
        return Err(invalid(format!(
            "expected an array, got {}",
            utils::kind_of(inject)
        )));
    }

    let mut names = Vec::new();
    let mut failure = None;
    utils::for_each(inject, |item, key| {
        if failure.is_some() {
            return;
        }
        match item.as_str() {
            Some(name) if !name.is_empty() => names.push(name.to_string()),
            Some(_) => failure = Some(format!("element {} is an empty string", key)),
            None => {
                failure = Some(format!("element {} is a {}", key, utils::kind_of(item)))
            }
        }
    })
    .map_err(|error| invalid(error.to_string()))?;

    match failure {
        Some(reason) => Err(invalid(reason)),
        None => Ok(names),
    }
}

/// 按声明顺序排列的已解析依赖
#[derive(Debug, Default, Clone)]
pub struct Dependencies {
    entries: Vec<(String, Instance)>,
}

impl Dependencies {
    pub(crate) fn new(entries: Vec<(String, Instance)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按位置取依赖并向下转型
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        let (name, instance) =
            self.entries
                .get(index)
                .ok_or(InjectorError::ArgumentOutOfRange {
                    index,
                    len: self.entries.len(),
                })?;
        instance.downcast_named(name)
    }

    /// 按名称取依赖并向下转型
    pub fn by_name<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .ok_or_else(|| InjectorError::DependencyNotFound {
                name: name.to_string(),
                required_by: "factory arguments".to_string(),
            })
            .and_then(|(entry, instance)| instance.downcast_named(entry))
    }

    pub fn instance(&self, index: usize) -> Option<&Instance> {
        self.entries.get(index).map(|(_, instance)| instance)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}
