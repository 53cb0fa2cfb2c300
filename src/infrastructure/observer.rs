//! 内置 `$observer` 模块
//!
//! 模块实例是一个观察者工厂，每次 `create` 得到一个独立的处理函数列表。

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::container::{Factory, Injectable, ModuleObject, ModuleReturn};

/// 内置观察者模块名
pub const OBSERVER_MODULE: &str = "$observer";

/// 注册处理函数时返回的标识，用于注销
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// 处理函数列表
pub struct Observer<T> {
    handlers: RwLock<Vec<(HandlerId, Handler<T>)>>,
    next_id: AtomicU64,
}

impl<T> Default for Observer<T> {
    fn default() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> Observer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, Arc::new(handler)));
        id
    }

    /// 注销处理函数，返回是否确实移除了
    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != before
    }

    /// 按注册顺序通知所有处理函数
    ///
    /// 通知前先复制列表，处理函数内部可以注册或注销。
    pub fn notify_all(&self, value: &T) {
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in snapshot {
            handler(value);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("handlers", &self.len())
            .finish()
    }
}

/// `$observer` 模块的实例
#[derive(Debug, Default, Clone, Copy)]
pub struct ObserverFactory;

impl ObserverFactory {
    pub fn create<T>(&self) -> Observer<T> {
        Observer::new()
    }

    /// `$observer` 模块的构造器，没有依赖
    pub(crate) fn injectable() -> Injectable<ModuleReturn> {
        Injectable::without_dependencies(Factory::new(|_| Ok(ModuleObject::new(ObserverFactory))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_notify_in_registration_order() {
        let observer = ObserverFactory.create::<u32>();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        observer.register_handler(move |value| first.lock().push(("first", *value)));
        let second = Arc::clone(&seen);
        observer.register_handler(move |value| second.lock().push(("second", *value)));

        observer.notify_all(&5);
        assert_eq!(*seen.lock(), vec![("first", 5), ("second", 5)]);
    }

    #[test]
    fn test_unregister_handler() {
        let observer: Observer<()> = Observer::new();
        let id = observer.register_handler(|_| {});
        observer.register_handler(|_| {});
        assert_eq!(observer.len(), 2);

        assert!(observer.unregister_handler(id));
        assert!(!observer.unregister_handler(id));
        assert_eq!(observer.len(), 1);
    }

    #[test]
    fn test_handler_can_register_during_notify() {
        let observer = Arc::new(Observer::<()>::new());
        let inner = Arc::clone(&observer);
        observer.register_handler(move |_| {
            inner.register_handler(|_| {});
        });

        observer.notify_all(&());
        assert_eq!(observer.len(), 2);
    }
}
