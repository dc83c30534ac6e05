//! Compile-time upvalue resolution: walks the enclosing-function chain
//! to decide whether a free identifier is a local of some enclosing
//! function (captured directly) or an upvalue of that enclosing
//! function (captured transitively). Grounded on the standard
//! closure-by-upvalue-chain resolver, extended
//! to the register-capturing case this compiler requires.

use super::chunk::UpvalueDescriptor;
use super::FunctionCompilerState;

pub(super) fn resolve_upvalue(
    frames: &mut Vec<FunctionCompilerState>,
    frame_idx: usize,
    name: &str,
) -> Option<u8> {
    if frame_idx == 0 {
        return None;
    }
    let parent_idx = frame_idx - 1;

    if let Some(local_reg) = frames[parent_idx].scope.resolve_local(name) {
        frames[parent_idx].scope.mark_captured(local_reg);
        return Some(add_upvalue(frames, frame_idx, true, local_reg));
    }

    if let Some(up_idx) = resolve_upvalue(frames, parent_idx, name) {
        return Some(add_upvalue(frames, frame_idx, false, up_idx));
    }

    None
}

fn add_upvalue(
    frames: &mut [FunctionCompilerState],
    frame_idx: usize,
    is_local: bool,
    index: u8,
) -> u8 {
    let frame = &mut frames[frame_idx];
    if let Some(pos) = frame
        .upvalues
        .iter()
        .position(|u| u.is_local == is_local && u.index == index)
    {
        return pos as u8;
    }
    frame.upvalues.push(UpvalueDescriptor { is_local, index });
    (frame.upvalues.len() - 1) as u8
}
