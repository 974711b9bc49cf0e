//! Keysym-to-key translation
//!
//! Pure functions converting XKB keysyms into layout-resolved `KeyId`s.
//! No I/O or mutable state.

use xkbcommon::xkb;

use crate::keys::{KeyId, NamedKey};

/// Map keysym to a named key. Checked before any character mapping.
pub(crate) fn named_key(keysym: xkb::Keysym) -> Option<NamedKey> {
    use xkbcommon::xkb::Keysym;

    match keysym {
        Keysym::Escape => Some(NamedKey::Escape),
        Keysym::space => Some(NamedKey::Space),
        Keysym::Return | Keysym::KP_Enter => Some(NamedKey::Enter),
        Keysym::BackSpace => Some(NamedKey::Backspace),
        Keysym::Tab | Keysym::ISO_Left_Tab => Some(NamedKey::Tab),
        Keysym::Shift_L => Some(NamedKey::ShiftLeft),
        Keysym::Shift_R => Some(NamedKey::ShiftRight),
        Keysym::Control_L => Some(NamedKey::ControlLeft),
        Keysym::Control_R => Some(NamedKey::ControlRight),
        Keysym::Alt_L | Keysym::Meta_L => Some(NamedKey::AltLeft),
        Keysym::Alt_R | Keysym::Meta_R | Keysym::ISO_Level3_Shift => Some(NamedKey::AltRight),
        Keysym::Super_L => Some(NamedKey::SuperLeft),
        Keysym::Super_R => Some(NamedKey::SuperRight),
        _ => None,
    }
}

/// Map keysym to an ASCII letter, either case
fn keysym_to_letter(keysym: xkb::Keysym) -> Option<char> {
    use xkbcommon::xkb::Keysym;

    let raw = keysym.raw();
    if (Keysym::a.raw()..=Keysym::z.raw()).contains(&raw)
        || (Keysym::A.raw()..=Keysym::Z.raw()).contains(&raw)
    {
        char::from_u32(raw)
    } else {
        None
    }
}

/// Returns `true` if `utf8` contains at least one printable (non-control) character.
pub(crate) fn is_printable(utf8: &str) -> bool {
    !utf8.is_empty() && !utf8.chars().all(char::is_control)
}

/// Convert a keysym plus its UTF-8 text into a key identity.
///
/// Named keys win; letters come from the keysym so Shift or Caps Lock do not
/// matter; any other printable key becomes its first character.
pub(crate) fn keysym_to_key(keysym: xkb::Keysym, utf8: &str) -> Option<KeyId> {
    if let Some(named) = named_key(keysym) {
        return Some(KeyId::Named(named));
    }
    if let Some(c) = keysym_to_letter(keysym) {
        return Some(KeyId::Char(c));
    }
    if is_printable(utf8) {
        return utf8.chars().next().map(KeyId::Char);
    }
    None
}

/// Parse a keysym name such as `"Alt_L"` or `"Super_R"` into a key identity.
///
/// Only modifiers, the named editing keys and printable characters have an
/// identity; function keys like `"F13"` parse to `None`. Exact names are
/// tried first, then a case-insensitive lookup.
pub(crate) fn parse_key_name(name: &str) -> Option<KeyId> {
    let mut keysym = xkb::keysym_from_name(name, xkb::KEYSYM_NO_FLAGS);
    if keysym == xkb::Keysym::NoSymbol {
        keysym = xkb::keysym_from_name(name, xkb::KEYSYM_CASE_INSENSITIVE);
    }
    if keysym == xkb::Keysym::NoSymbol {
        return None;
    }
    let utf8 = xkb::keysym_to_utf8(keysym);
    keysym_to_key(keysym, utf8.trim_end_matches('\0'))
}
