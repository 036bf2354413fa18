//! Rendering of parts: embeds, search listings, and the component ids that
//! route button and select-menu clicks back to a part.

use baja_parts::{Part, PartSearch, PartsSchema, StatusField};
use serenity::builder::{
    CreateActionRow, CreateButton, CreateEmbed, CreateSelectMenu, CreateSelectMenuKind,
    CreateSelectMenuOption,
};
use serenity::model::application::ButtonStyle;

const PART_COLOUR: u32 = 0x3498db;

/// Discord caps a string select at 25 options.
const MAX_SELECT_OPTIONS: usize = 25;

const UNSET: &str = "Not set";

/// A click on one of the part components, decoded from its custom id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartAction {
    /// Open the full view of a search result.
    Show { page_id: String },
    /// A status select menu; the chosen option arrives with the interaction.
    SetStatus { field: StatusField, page_id: String },
    /// The "Make Part" button.
    Make { page_id: String },
}

impl PartAction {
    pub fn custom_id(&self) -> String {
        match self {
            PartAction::Show { page_id } => format!("part:show:{page_id}"),
            PartAction::SetStatus { field, page_id } => {
                format!("part:status:{}:{page_id}", field.key())
            }
            PartAction::Make { page_id } => format!("part:make:{page_id}"),
        }
    }

    pub fn parse(custom_id: &str) -> Option<Self> {
        let rest = custom_id.strip_prefix("part:")?;
        let (verb, rest) = rest.split_once(':')?;
        match verb {
            "show" if !rest.is_empty() => Some(PartAction::Show {
                page_id: rest.to_string(),
            }),
            "make" if !rest.is_empty() => Some(PartAction::Make {
                page_id: rest.to_string(),
            }),
            "status" => {
                let (field, page_id) = rest.split_once(':')?;
                if page_id.is_empty() {
                    return None;
                }
                Some(PartAction::SetStatus {
                    field: field.parse().ok()?,
                    page_id: page_id.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Name, value, inline triples shown on a part embed.
pub fn embed_fields(part: &Part) -> Vec<(String, String, bool)> {
    let mut fields: Vec<(String, String, bool)> = StatusField::ALL
        .iter()
        .map(|f| {
            (
                f.property().to_string(),
                part.status(*f).unwrap_or(UNSET).to_string(),
                true,
            )
        })
        .collect();
    fields.push((
        "Qty Made".to_string(),
        part.qty_made()
            .map(|q| q.to_string())
            .unwrap_or_else(|| UNSET.to_string()),
        true,
    ));
    if let Some(drawing) = part.drawing() {
        fields.push(("Drawing".to_string(), drawing.name, false));
    }
    fields
}

pub fn part_embed(part: &Part) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title(part.title()).colour(PART_COLOUR);
    if !part.url.is_empty() {
        embed = embed.url(&part.url);
    }
    for (name, value, inline) in embed_fields(part) {
        embed = embed.field(name, value, inline);
    }
    embed
}

/// Text of a multi-result search reply. Numbers match the buttons.
pub fn search_message(term: &str, search: &PartSearch) -> String {
    let truncated = if search.truncated { " (truncated)" } else { "" };
    let listing: Vec<String> = search
        .parts
        .iter()
        .enumerate()
        .map(|(i, part)| format!("{}. {}", i + 1, part.title()))
        .collect();
    format!(
        "Search results for: \"{term}\"{truncated}:\nClick button for more info.\n{}",
        listing.join("\n")
    )
}

/// One numbered button per search result.
pub fn search_buttons(parts: &[Part]) -> Vec<CreateActionRow> {
    parts
        .chunks(5)
        .enumerate()
        .map(|(row, chunk)| {
            let buttons = chunk
                .iter()
                .enumerate()
                .map(|(i, part)| {
                    CreateButton::new(
                        PartAction::Show {
                            page_id: part.id.clone(),
                        }
                        .custom_id(),
                    )
                    .label((row * 5 + i + 1).to_string())
                    .style(ButtonStyle::Secondary)
                })
                .collect();
            CreateActionRow::Buttons(buttons)
        })
        .collect()
}

/// Select-menu entries for one status field, current value preselected.
pub fn status_options(part: &Part, schema: &PartsSchema, field: StatusField) -> Vec<(String, String, bool)> {
    let current = part.status(field);
    schema
        .options(field)
        .iter()
        .take(MAX_SELECT_OPTIONS)
        .map(|option| {
            (
                format!("{} - {}", field.label(), option),
                option.clone(),
                current == Some(option.as_str()),
            )
        })
        .collect()
}

/// Three status selects and the "Make Part" button.
pub fn update_components(part: &Part, schema: &PartsSchema) -> Vec<CreateActionRow> {
    let mut rows: Vec<CreateActionRow> = StatusField::ALL
        .iter()
        .filter(|f| !schema.options(**f).is_empty())
        .map(|field| {
            let options = status_options(part, schema, *field)
                .into_iter()
                .map(|(label, value, selected)| {
                    CreateSelectMenuOption::new(label, value).default_selection(selected)
                })
                .collect();
            let id = PartAction::SetStatus {
                field: *field,
                page_id: part.id.clone(),
            }
            .custom_id();
            CreateActionRow::SelectMenu(
                CreateSelectMenu::new(id, CreateSelectMenuKind::String { options })
                    .placeholder(field.property())
                    .max_values(1),
            )
        })
        .collect();

    rows.push(CreateActionRow::Buttons(vec![CreateButton::new(
        PartAction::Make {
            page_id: part.id.clone(),
        }
        .custom_id(),
    )
    .label("Make Part")
    .style(ButtonStyle::Primary)]));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn part(id: &str, number: &str, name: &str) -> Part {
        Part::from_json(json!({
            "id": id,
            "url": format!("https://www.notion.so/{id}"),
            "properties": {
                "Part Number": {"type": "rich_text", "rich_text": [{"plain_text": number}]},
                "Part Name": {"type": "title", "title": [{"plain_text": name}]},
                "Design Status": {"type": "status", "status": {"name": "Released"}},
                "PO Status": {"type": "status", "status": null},
                "Mfg Status": {"type": "status", "status": {"name": "Done"}},
                "Qty Made": {"type": "number", "number": null}
            }
        }))
        .unwrap()
    }

    fn schema() -> PartsSchema {
        let status = |names: &[&str]| {
            json!({"type": "status", "status": {"options": names.iter().map(|n| json!({"name": n})).collect::<Vec<_>>()}})
        };
        PartsSchema::from_json(json!({"properties": {
            "Design Status": status(&["Not Started", "Released"]),
            "PO Status": status(&["Ordered"]),
            "Mfg Status": status(&["In Progress", "Done"]),
        }}))
        .unwrap()
    }

    #[test]
    fn custom_ids_decode_back_to_actions() {
        for action in [
            PartAction::Show { page_id: "abc-123".to_string() },
            PartAction::SetStatus { field: StatusField::Po, page_id: "abc-123".to_string() },
            PartAction::Make { page_id: "abc-123".to_string() },
        ] {
            assert_eq!(PartAction::parse(&action.custom_id()), Some(action));
        }
    }

    #[test]
    fn foreign_or_broken_ids_are_ignored() {
        assert_eq!(PartAction::parse("schedule:1"), None);
        assert_eq!(PartAction::parse("part:make:"), None);
        assert_eq!(PartAction::parse("part:status:qty:abc"), None);
        assert_eq!(PartAction::parse("part:status:po"), None);
    }

    #[test]
    fn embed_fields_show_statuses_and_quantity() {
        let fields = embed_fields(&part("p1", "BAJA-1", "Hub"));
        assert_eq!(
            fields,
            vec![
                ("Design Status".to_string(), "Released".to_string(), true),
                ("PO Status".to_string(), "Not set".to_string(), true),
                ("Mfg Status".to_string(), "Done".to_string(), true),
                ("Qty Made".to_string(), "Not set".to_string(), true),
            ]
        );
    }

    #[test]
    fn search_message_numbers_results() {
        let search = PartSearch {
            parts: vec![part("p1", "BAJA-1", "Hub"), part("p2", "BAJA-2", "Knuckle")],
            truncated: true,
        };
        assert_eq!(
            search_message("baja", &search),
            "Search results for: \"baja\" (truncated):\nClick button for more info.\n1. BAJA-1 - Hub\n2. BAJA-2 - Knuckle"
        );
    }

    #[test]
    fn status_options_preselect_current_value() {
        let options = status_options(&part("p1", "BAJA-1", "Hub"), &schema(), StatusField::Mfg);
        assert_eq!(
            options,
            vec![
                ("Mfg status - In Progress".to_string(), "In Progress".to_string(), false),
                ("Mfg status - Done".to_string(), "Done".to_string(), true),
            ]
        );
    }

    #[test]
    fn components_have_a_row_per_status_plus_button() {
        let rows = update_components(&part("p1", "BAJA-1", "Hub"), &schema());
        assert_eq!(rows.len(), 4);
        assert_eq!(search_buttons(&[part("a", "1", "x"), part("b", "2", "y")]).len(), 1);
    }
}
