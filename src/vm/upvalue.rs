//! Runtime upvalue cells.
//!
//! An upvalue starts *open*, aliasing a live register in some frame's
//! window; when that frame returns, the VM closes every upvalue whose
//! register falls inside the returning window by copying the current
//! value out. Two closures that captured the same local share the same
//! `Rc<RefCell<UpvalueCell>>`, so a write through one is visible to the
//! other — before *and* after the enclosing frame returns.

#[derive(Debug)]
pub enum UpvalueCell {
    /// Aliases register `index` in the flat register array.
    Open(usize),
    Closed(super::value::Value),
}
