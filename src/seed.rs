//! Demo dress catalog loaded by the `seed` binary and by the in-memory store at
//! startup.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{ColorStock, Product, ProductStatus, SizeStock, slugify};

struct DemoDress {
    name: &'static str,
    description: &'static str,
    category: &'static str,
    price: i64,
    discount: i32,
    featured: bool,
    sizes: &'static [(&'static str, i32)],
    colors: &'static [(&'static str, &'static str, i32)],
}

const CATALOG: &[DemoDress] = &[
    DemoDress {
        name: "Elegant Floral Summer Dress",
        description: "A beautiful floral dress for summer occasions, cut from breathable cotton with a flattering A-line silhouette.",
        category: "Summer",
        price: 2499,
        discount: 28,
        featured: true,
        sizes: &[("XS", 10), ("S", 15), ("M", 20), ("L", 15), ("XL", 10)],
        colors: &[("Pink", "#FFC0CB", 25), ("Blue", "#87CEEB", 20), ("Yellow", "#FFFFE0", 25)],
    },
    DemoDress {
        name: "Classic Black Evening Gown",
        description: "An elegant floor-length evening gown for formal events, in a satin-finish polyester blend.",
        category: "Formal",
        price: 5999,
        discount: 25,
        featured: true,
        sizes: &[("S", 8), ("M", 12), ("L", 10), ("XL", 6)],
        colors: &[("Black", "#000000", 20), ("Navy", "#000080", 16)],
    },
    DemoDress {
        name: "Comfortable Casual Maxi Dress",
        description: "A relaxed maxi dress in soft jersey for all-day comfort, with long sleeves and side pockets.",
        category: "Casual",
        price: 1999,
        discount: 20,
        featured: true,
        sizes: &[("XS", 12), ("S", 18), ("M", 25), ("L", 20), ("XL", 15), ("XXL", 10)],
        colors: &[("Green", "#90EE90", 30), ("Blue", "#87CEEB", 35), ("Brown", "#D2B48C", 35)],
    },
    DemoDress {
        name: "Stylish Cocktail Party Dress",
        description: "A fit-and-flare cocktail dress for parties and social evenings, with a modern neckline.",
        category: "Cocktail",
        price: 3499,
        discount: 22,
        featured: false,
        sizes: &[("XS", 8), ("S", 12), ("M", 15), ("L", 12)],
        colors: &[("Purple", "#800080", 20), ("Black", "#000000", 15), ("Red", "#DC143C", 12)],
    },
];

pub fn demo_products() -> Vec<Product> {
    let now = Utc::now();
    CATALOG
        .iter()
        .map(|dress| Product {
            id: Uuid::new_v4(),
            name: dress.name.to_string(),
            slug: slugify(dress.name),
            description: Some(dress.description.to_string()),
            category: dress.category.to_string(),
            price: dress.price,
            discount: dress.discount,
            image: None,
            sizes: dress
                .sizes
                .iter()
                .map(|(size, stock)| SizeStock {
                    size: size.to_string(),
                    stock: *stock,
                })
                .collect(),
            colors: dress
                .colors
                .iter()
                .map(|(name, hex, stock)| ColorStock {
                    name: name.to_string(),
                    hex_code: Some(hex.to_string()),
                    stock: *stock,
                })
                .collect(),
            status: ProductStatus::Active,
            featured: dress.featured,
            created_at: now,
            updated_at: now,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_unique_slugs_and_stock() {
        let products = demo_products();
        assert_eq!(products.len(), 4);
        for (idx, product) in products.iter().enumerate() {
            assert!(product.total_stock() > 0);
            assert!(products[..idx].iter().all(|p| p.slug != product.slug));
        }
        assert_eq!(products[0].slug, "elegant-floral-summer-dress");
        assert_eq!(products[0].discounted_price(), 1799);
        assert_eq!(products.iter().filter(|p| p.featured).count(), 3);
    }
}
