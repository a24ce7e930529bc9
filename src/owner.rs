use std::ops::{Deref, DerefMut};

use crate::error::Result;

/// A container type which holds a value that may be temporarily owned by a
/// consumer.
///
/// The tree's structural operations (`Tree::attach`, `Tree::with_value`)
/// consume the tree and hand back a new one; `Owner` lets a walker run them
/// in place while only holding `&mut`.
pub struct Owner<T> {
    inner: Option<T>,
}

impl<T> Owner<T> {
    /// Creates a new `Owner` which holds the given value.
    pub fn new(value: T) -> Owner<T> {
        Owner { inner: Some(value) }
    }

    /// Takes temporary ownership of the contained value by passing it to `f`.
    /// The function must return a value of the same type (the same value, or a
    /// new value to take its place).
    ///
    /// # Example
    /// ```
    /// # use merk_avl::owner::Owner;
    /// let mut owner = Owner::new(vec![1, 2]);
    /// owner.own(|mut v| {
    ///     v.push(3);
    ///     v
    /// });
    /// assert_eq!(*owner, vec![1, 2, 3]);
    /// ```
    pub fn own<F: FnOnce(T) -> T>(&mut self, f: F) {
        let old_value = unwrap(self.inner.take());
        let new_value = f(old_value);
        self.inner = Some(new_value);
    }

    /// Like `own`, but uses a tuple return type which allows specifying a value
    /// to return from the call to `own_return` for convenience.
    ///
    /// # Example
    /// ```
    /// # use merk_avl::owner::Owner;
    /// let mut owner = Owner::new(123);
    /// let doubled = owner.own_return(|n| (n, n * 2));
    /// assert_eq!(doubled, 246);
    /// ```
    pub fn own_return<R, F>(&mut self, f: F) -> R
    where
        R: Sized,
        F: FnOnce(T) -> (T, R),
    {
        let old_value = unwrap(self.inner.take());
        let (new_value, return_value) = f(old_value);
        self.inner = Some(new_value);
        return_value
    }

    /// Like `own`, but for operations which may fail. On error the contained
    /// value has been consumed, so the `Owner` is consumed as well and the
    /// error is returned.
    pub fn own_result<F>(mut self, f: F) -> Result<Self>
    where
        F: FnOnce(T) -> Result<T>,
    {
        let old_value = unwrap(self.inner.take());
        let new_value = f(old_value)?;
        self.inner = Some(new_value);
        Ok(self)
    }

    /// Sheds the `Owner` container and returns the value it contained.
    pub fn into_inner(mut self) -> T {
        unwrap(self.inner.take())
    }
}

impl<T> Deref for Owner<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unwrap(self.inner.as_ref())
    }
}

impl<T> DerefMut for Owner<T> {
    fn deref_mut(&mut self) -> &mut T {
        unwrap(self.inner.as_mut())
    }
}

fn unwrap<T>(option: Option<T>) -> T {
    match option {
        Some(value) => value,
        None => unreachable!("value should be Some"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::Error;

    #[test]
    fn own_replaces_value() {
        let mut owner = Owner::new(String::from("a"));
        owner.own(|s| s + "b");
        assert_eq!(owner.as_str(), "ab");
        assert_eq!(owner.into_inner(), "ab");
    }

    #[test]
    fn own_result_ok() {
        let owner = Owner::new(1u8);
        let owner = owner.own_result(|n| Ok(n + 1)).expect("own_result failed");
        assert_eq!(*owner, 2);
    }

    #[test]
    fn own_result_err() {
        let owner = Owner::new(1u8);
        let res = owner.own_result(|_| Err(Error::Invariant("nope".into())));
        assert!(res.is_err());
    }
}
