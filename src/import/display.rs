use super::morph::morph_type;
use crate::pmx::{self, DisplayElement};
use crate::scene::{DisplayFrame, DisplayItem};
use crate::{Error, Result};

/// Display frames with bone and morph references resolved to names.
pub fn frames(
    model: &pmx::Model,
    bone_names: &[String],
    morph_names: &[String],
) -> Result<Vec<DisplayFrame>> {
    let mut out = Vec::with_capacity(model.display_frames.len());
    for frame in &model.display_frames {
        let mut items = vec![];
        for element in &frame.elements {
            match *element {
                DisplayElement::Bone(Some(i)) => {
                    let name = bone_names
                        .get(i)
                        .ok_or_else(|| Error::invalid_index("bone", i))?;
                    items.push(DisplayItem::Bone(name.clone()));
                }
                DisplayElement::Morph(Some(i)) => {
                    let morph = model
                        .morphs
                        .get(i)
                        .ok_or_else(|| Error::invalid_index("morph", i))?;
                    match morph_type(&morph.kind) {
                        Some(t) => {
                            let name = morph_names.get(i).unwrap_or(&morph.name);
                            items.push(DisplayItem::Morph(t, name.clone()));
                        }
                        None => log::debug!("{}: morph {} cannot be displayed", frame.name, morph.name),
                    }
                }
                DisplayElement::Bone(None) | DisplayElement::Morph(None) => {
                    log::warn!("{}: empty display item skipped", frame.name);
                }
            }
        }
        out.push(DisplayFrame {
            name: frame.name.clone(),
            name_e: frame.name_en.clone(),
            is_special: frame.special,
            items,
        });
    }
    Ok(out)
}
