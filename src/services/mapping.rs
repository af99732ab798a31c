use chrono::Utc;

use crate::{
    entity::{
        cart_items, carts, categories, chat_messages, chats, farms, order_items, orders,
        payments, products, reviews, users,
    },
    models::{
        Cart, CartLine, Category, Chat, ChatMessage, Farm, Location, Order, OrderLine, Payment,
        Product, Review, User,
    },
};

pub(crate) fn user_from_entity(model: users::Model) -> User {
    User {
        id: model.id,
        email: model.email,
        name: model.name,
        role: model.role,
        phone: model.phone,
        farm_id: model.farm_id,
        stripe_onboarded: model.stripe_onboarded,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn url_list(value: serde_json::Value) -> Vec<String> {
    serde_json::from_value(value).unwrap_or_default()
}

pub(crate) fn farm_from_entity(model: farms::Model) -> Farm {
    Farm {
        id: model.id,
        seller_id: model.seller_id,
        category_id: model.category_id,
        name: model.name,
        description: model.description,
        location: Location {
            street: model.street,
            city: model.city,
            state: model.state,
            zip_code: model.zip_code,
        },
        images: url_list(model.images),
        videos: url_list(model.videos),
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn review_from_entity(model: reviews::Model) -> Review {
    Review {
        id: model.id,
        farm_id: model.farm_id,
        user_id: model.user_id,
        text: model.text,
        rating: model.rating,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn category_from_entity(model: categories::Model) -> Category {
    Category {
        id: model.id,
        name: model.name,
        description: model.description,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn product_from_entity(model: products::Model) -> Product {
    Product {
        id: model.id,
        farm_id: model.farm_id,
        category_id: model.category_id,
        title: model.title,
        description: model.description,
        price: model.price,
        stock: model.stock,
        unit: model.unit,
        thumbnail_url: model.thumbnail_url,
        status: model.status,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn cart_line_from_entity(model: cart_items::Model) -> CartLine {
    CartLine {
        product_id: model.product_id,
        farm_id: model.farm_id,
        quantity: model.quantity,
        price: model.price,
        line_total: i64::from(model.quantity).saturating_mul(model.price),
    }
}

pub(crate) fn cart_from_entity(model: carts::Model, items: Vec<CartLine>) -> Cart {
    Cart {
        id: model.id,
        user_id: model.user_id,
        items,
        total: model.total,
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_from_entity(model: orders::Model) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        farm_id: model.farm_id,
        address: model.address,
        total_price: model.total_price,
        status: model.status,
        payment_status: model.payment_status,
        transaction_id: model.transaction_id,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn order_line_from_entity(model: order_items::Model) -> OrderLine {
    OrderLine {
        product_id: model.product_id,
        quantity: model.quantity,
        price: model.price,
        line_total: model.line_total,
    }
}

pub(crate) fn payment_from_entity(model: payments::Model) -> Payment {
    Payment {
        id: model.id,
        user_id: model.user_id,
        order_id: model.order_id,
        amount: model.amount,
        kind: model.kind,
        status: model.status,
        transaction_id: model.transaction_id,
        transfer_id: model.transfer_id,
        admin_share: model.admin_share,
        seller_share: model.seller_share,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn chat_from_entity(model: chats::Model) -> Chat {
    Chat {
        id: model.id,
        farm_id: model.farm_id,
        user_id: model.user_id,
        name: model.name,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

pub(crate) fn message_from_entity(model: chat_messages::Model) -> ChatMessage {
    ChatMessage {
        id: model.id,
        chat_id: model.chat_id,
        sender_id: model.sender_id,
        text: model.text,
        read: model.read,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
