//! Built-in fallback dataset served when the catalog is unreachable.

use crate::model::{Category, Item, Status};

fn sample(
    id: &str,
    title: &str,
    description: &str,
    location: &str,
    category: Category,
    status: Status,
    date: &str,
) -> Item {
    Item {
        id: Some(id.to_string()),
        title: title.to_string(),
        description: description.to_string(),
        location: location.to_string(),
        category,
        status: Some(status),
        date: Some(date.to_string()),
        approved: true,
        ..Item::default()
    }
}

/// Three fixed sample reports.
#[must_use]
pub fn sample_items() -> Vec<Item> {
    vec![
        sample(
            "sample-1",
            "Blue Backpack",
            "Navy backpack with a laptop sleeve and a keychain on the zipper.",
            "Library, 2nd floor",
            Category::Accessory,
            Status::Lost,
            "2024-09-02",
        ),
        sample(
            "sample-2",
            "Student ID Card",
            "Campus card found near the card readers.",
            "Cafeteria entrance",
            Category::Document,
            Status::Found,
            "2024-09-03",
        ),
        sample(
            "sample-3",
            "Wireless Earbuds",
            "White charging case, left bud missing.",
            "Sports hall lockers",
            Category::Electronic,
            Status::Lost,
            "2024-09-05",
        ),
    ]
}
