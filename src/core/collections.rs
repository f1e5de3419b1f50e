//! Collections edited by the console

use super::schema::{AutoValue, Collection, Property};

const SLUG_PATTERN: &str = "^[a-z][a-z0-9-]*[a-z0-9]+$";
const HEX_COLOUR_PATTERN: &str = "^#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})$";

/// Every collection, in sidebar order
pub fn all() -> Vec<Collection> {
    vec![bytes(), byte_series(), nibbles(), recipes(), tech_blogs()]
}

fn image(name: &str, storage_path: &str) -> Property {
    Property::string(name).storage(storage_path).required()
}

fn publishing(collection: Collection) -> Collection {
    collection
        .property("isPublished", Property::boolean("Is published?").required())
        .property(
            "publishDate",
            Property::date("Publish date").auto(AutoValue::OnCreate),
        )
        .property(
            "lastModifiedDate",
            Property::date("Last modified date").auto(AutoValue::OnUpdate),
        )
}

fn captioned_image(storage_path: &str) -> Property {
    Property::map(
        "Captioned image",
        vec![
            ("image", image("Image", storage_path)),
            ("caption", Property::string("Caption").markdown().required()),
        ],
    )
}

pub fn bytes() -> Collection {
    let body = Property::one_of(
        "Body",
        vec![
            (
                "paragraph",
                Property::paragraph("Paragraph")
                    .required()
                    .description("Markdown text, or LaTeX typeset as display math"),
            ),
            ("equation", Property::latex("Equation").required()),
            ("captionedImage", captioned_image("images/bytes/bodyImages")),
        ],
    );

    let section = Property::map(
        "Section",
        vec![
            ("title", Property::string("Heading").required()),
            ("body", Property::array("Body", body).required()),
        ],
    );

    let collection = Collection::new("Bytes", "Byte", "v1_bytes")
        .property("title", Property::string("Title").required().unique())
        .property("subtitle", Property::string("Subtitle").required())
        .property(
            "series",
            Property::reference("Series", "v1_byte_series").required(),
        )
        .property(
            "slug",
            Property::string("Slug")
                .required()
                .unique()
                .min(5)
                .matches(SLUG_PATTERN),
        )
        .property("thumbnail", image("Thumbnail", "images/bytes/thumbnails"))
        .property("coverPhoto", image("Cover photo", "images/bytes/coverPhotos"));

    publishing(collection).property(
        "sections",
        Property::array("Sections", section).required().min(1),
    )
}

pub fn byte_series() -> Collection {
    Collection::new("Byte series", "Byte series", "v1_byte_series")
        .property("title", Property::string("Title").required().unique())
        .property(
            "accentColour",
            Property::string("Accent hexadecimal colour")
                .required()
                .matches(HEX_COLOUR_PATTERN),
        )
}

fn ingredients() -> Property {
    Property::array(
        "Ingredients",
        Property::map(
            "Ingredient",
            vec![
                ("name", Property::string("Name").required()),
                ("quantity", Property::number("Quantity").required()),
                ("measurement", Property::string("Measurement")),
            ],
        ),
    )
    .required()
    .min(1)
}

pub fn nibbles() -> Collection {
    let collection = Collection::new("Nibbles", "Nibble", "v1_nibbles")
        .property("title", Property::string("Title").required().unique())
        .property("thumbnail", image("Thumbnail", "images/nibbles/thumbnails"))
        .property("coverPhoto", image("Cover photo", "images/nibbles/coverPhotos"))
        .property(
            "slug",
            Property::string("Slug")
                .required()
                .unique()
                .min(5)
                .matches(SLUG_PATTERN),
        )
        .property("source", Property::string("Source").required())
        .property("ingredients", ingredients())
        .property(
            "steps",
            Property::array("Steps", Property::string("Step").multiline().required())
                .required()
                .min(1),
        );

    publishing(collection).property(
        "timeTakenMinutes",
        Property::number("Time taken (minutes)").required(),
    )
}

pub fn recipes() -> Collection {
    let step = Property::map(
        "Step",
        vec![
            ("instruction", Property::string("Instruction").multiline().required()),
            ("image", Property::string("Image").storage("images/recipes/steps")),
        ],
    );

    let collection = Collection::new("Recipes", "Recipe", "v1_recipes")
        .property("title", Property::string("Title").required().unique())
        .property("source", Property::string("Source").required())
        .property("ingredients", ingredients())
        .property("steps", Property::array("Steps", step).required().min(1));

    publishing(collection).property(
        "timeTakenMinutes",
        Property::number("Time taken (minutes)").required(),
    )
}

pub fn tech_blogs() -> Collection {
    let body = Property::one_of(
        "Body",
        vec![
            ("text", Property::paragraph("Paragraph").required()),
            (
                "code",
                Property::map(
                    "Code",
                    vec![
                        ("language", Property::string("Language").required()),
                        ("code", Property::string("Code").multiline().required()),
                    ],
                ),
            ),
            ("captionedImage", captioned_image("images")),
        ],
    );

    let section = Property::map(
        "Section",
        vec![
            ("title", Property::string("Heading").required()),
            ("body", Property::array("Body", body).required()),
        ],
    );

    let collection = Collection::new("Tech blogs", "Tech blog entry", "v1_tech_blogs")
        .property("title", Property::string("Title").required().unique());

    publishing(collection).property(
        "sections",
        Property::array("Sections", section).required().min(1),
    )
}
