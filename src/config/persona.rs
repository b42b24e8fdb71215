use crate::locale::Locale;
use crate::pricing::{ total_cost, MATERIALS, BASE_FEE };
use lazy_static::lazy_static;
use std::fmt::Write;

pub const COMPANY_NAME: &str = "Ilex Art";
pub const ADDRESS: &str = "123 Art Avenue, Design District, NY 10012";
pub const PHONE: &str = "+1 (555) 123-4567";
pub const EMAIL: &str = "hello@ilexart.com";
pub const HOURS: &str = "Mon-Fri, 9am - 6pm EST";
pub const PRODUCTION_DAYS: &str = "3-5";

const MATERIAL_TRAITS: [(&str, &str); 4] = [
    ("canvas", "Textured cotton, museum quality, matte"),
    ("vinyl", "Durable, washable, smooth, good for commercial"),
    ("fresco", "Plaster texture, mimics traditional wall painting, unique"),
    ("non-woven", "Eco-friendly, breathable, easy to apply/remove"),
];

lazy_static! {
    static ref SYSTEM_INSTRUCTION: String = build_system_instruction();
}

/// The system-role text sent ahead of every conversation.
pub fn system_instruction() -> &'static str {
    SYSTEM_INSTRUCTION.as_str()
}

fn build_system_instruction() -> String {
    let mut catalog = String::new();
    for (i, material) in MATERIALS.iter().enumerate() {
        let traits = MATERIAL_TRAITS.iter()
            .find(|(id, _)| *id == material.id)
            .map(|(_, t)| *t)
            .unwrap_or_else(|| material.description(Locale::En));
        let _ = writeln!(
            catalog,
            "{}. **{}**: ${}/m². ({}).",
            i + 1,
            material.name(Locale::En),
            material.price_per_sqm,
            traits
        );
    }

    let canvas = &MATERIALS[0];
    let example_total = total_cost(2.0, 3.0, canvas.price_per_sqm);

    format!(
        "You are the intelligent virtual assistant for \"{company}\", a premium wall printing company.\n\
Your goal is to assist customers with choosing materials, estimating prices, and navigating the website.\n\
\n\
**Company Profile:**\n\
- Name: {company}\n\
- Vibe: Premium, artistic, modern, sophisticated technology.\n\
- Services: High-definition wall printing, custom murals, art reproduction.\n\
- Location: {address}.\n\
- Contact: {phone}, {email}.\n\
- Hours: {hours}.\n\
\n\
**Products & Pricing (Currency: USD):**\n\
{catalog}\n\
**Pricing Formula:**\n\
- Total Cost = (Width * Height * PricePerSqm) + ${fee} Base Processing Fee.\n\
- Example: 2m x 3m {canvas} = (6 * {rate}) + {fee} = ${example}.\n\
\n\
**Shipping & Production:**\n\
- Production time: {days} business days.\n\
- Shipping available worldwide.\n\
\n\
**Tone of Voice:**\n\
- Professional but warm.\n\
- Artistic and appreciative of design.\n\
- Helpful and concise.\n\
\n\
**Guidelines:**\n\
- If a user asks for a price, ask for their wall dimensions (width and height) and preferred material, then calculate it for them using the formula above.\n\
- If a user asks about the portfolio, encourage them to visit the Portfolio page.\n\
- If a user wants to order, guide them to the Calculator or Contact page.\n\
- ALWAYS reply in the same language the user is speaking (English or Russian).\n",
        company = COMPANY_NAME,
        address = ADDRESS,
        phone = PHONE,
        email = EMAIL,
        hours = HOURS,
        catalog = catalog,
        fee = BASE_FEE,
        canvas = canvas.name(Locale::En),
        rate = canvas.price_per_sqm,
        example = example_total,
        days = PRODUCTION_DAYS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_the_formula_and_worked_example() {
        let text = system_instruction();
        assert!(text.contains("+ $50 Base Processing Fee"));
        assert!(text.contains("2m x 3m Premium Canvas = (6 * 45) + 50 = $320."));
    }

    #[test]
    fn lists_every_material_with_its_rate() {
        let text = system_instruction();
        assert!(text.contains("**Premium Canvas**: $45/m²"));
        assert!(text.contains("**Self-Adhesive Vinyl**: $30/m²"));
        assert!(text.contains("**Digital Fresco**: $65/m²"));
        assert!(text.contains("**Non-Woven Wallpaper**: $35/m²"));
    }

    #[test]
    fn carries_behavioral_directives() {
        let text = system_instruction();
        assert!(text.contains("ask for their wall dimensions"));
        assert!(text.contains("ALWAYS reply in the same language"));
        assert!(text.contains(EMAIL));
    }
}
