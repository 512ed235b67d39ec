//! Conversions from PMX space (left-handed, Y up) to scene space (right-handed, Z up).

use glam::{Vec2, Vec3};

#[inline]
pub fn position(v: [f32; 3], scale: f32) -> Vec3 {
    Vec3::new(v[0], v[2], v[1]) * scale
}

#[inline]
pub fn direction(v: [f32; 3]) -> Vec3 {
    Vec3::new(v[0], v[2], v[1])
}

#[inline]
pub fn rotation(v: [f32; 3]) -> Vec3 {
    -Vec3::new(v[0], v[2], v[1])
}

#[inline]
pub fn uv(v: [f32; 2]) -> Vec2 {
    Vec2::new(v[0], 1.0 - v[1])
}

/// Returns `name`, or `name.001`, `name.002`, ... whichever is free first.
pub fn unique_name(name: &str, exists: impl Fn(&str) -> bool) -> String {
    if !exists(name) {
        return name.to_string();
    }
    (1..)
        .map(|i| format!("{}.{:03}", name, i))
        .find(|n| !exists(n))
        .unwrap_or_else(|| name.to_string())
}

/// `左腕` becomes `腕.L`, `右腕` becomes `腕.R`; other names are returned unchanged.
pub fn name_to_lr(name: &str) -> String {
    if let Some(rest) = name.strip_prefix('左') {
        if !rest.is_empty() {
            return format!("{}.L", rest);
        }
    }
    if let Some(rest) = name.strip_prefix('右') {
        if !rest.is_empty() {
            return format!("{}.R", rest);
        }
    }
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axes() {
        assert!(position([1.0, 2.0, 3.0], 2.0) == Vec3::new(2.0, 6.0, 4.0));
        assert!(rotation([0.1, 0.2, 0.3]) == Vec3::new(-0.1, -0.3, -0.2));
        assert!(uv([0.25, 0.25]) == Vec2::new(0.25, 0.75));
    }

    #[test]
    fn unique() {
        let taken = ["a", "a.001"];
        assert!(unique_name("b", |n| taken.contains(&n)) == "b");
        assert!(unique_name("a", |n| taken.contains(&n)) == "a.002");
    }

    #[test]
    fn lr() {
        assert!(name_to_lr("左腕") == "腕.L");
        assert!(name_to_lr("右足ＩＫ") == "足ＩＫ.R");
        assert!(name_to_lr("センター") == "センター");
        assert!(name_to_lr("左") == "左");
    }
}
