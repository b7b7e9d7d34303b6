use std::{
    any::{Any, TypeId},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// Any runtime value a capability operation can be invoked against.
///
/// Specialization keys off the concrete Rust type only, so every
/// `'static + Send + Sync + Debug` value is a receiver.
pub trait Receiver: Any + Send + Sync + fmt::Debug {
    fn receiver_type(&self) -> ReceiverType;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Send + Sync + fmt::Debug> Receiver for T {
    #[inline]
    fn receiver_type(&self) -> ReceiverType {
        match pointee(self) {
            Some(inner) => inner.receiver_type(),
            None => ReceiverType::of::<T>(),
        }
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        match pointee(self) {
            Some(inner) => inner.as_any(),
            None => self,
        }
    }
}

/// The receiver behind a type-erased pointer. Pointers to `dyn Receiver`
/// are receivers themselves, but never the type to specialize on.
#[inline]
fn pointee<T: Any>(value: &T) -> Option<&dyn Receiver> {
    let any = value as &dyn Any;
    if let Some(boxed) = any.downcast_ref::<Box<dyn Receiver>>() {
        return Some(boxed.as_ref());
    }
    if let Some(shared) = any.downcast_ref::<Arc<dyn Receiver>>() {
        return Some(shared.as_ref());
    }
    any.downcast_ref::<&'static dyn Receiver>().map(|r| *r)
}

impl dyn Receiver {
    #[inline]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    #[inline]
    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Runtime type identity of a receiver. Only `id` takes part in equality.
#[derive(Copy, Clone)]
pub struct ReceiverType {
    id: TypeId,
    name: &'static str,
}

impl ReceiverType {
    #[must_use]
    pub fn of<T: ?Sized + Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for ReceiverType {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ReceiverType {}

impl Hash for ReceiverType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ReceiverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ReceiverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
