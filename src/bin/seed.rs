use farm_market_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    services::auth_service::hash_password,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "Admin", "admin12345", "admin").await?;
    let seller_id =
        ensure_user(&pool, "seller@example.com", "Sunny Acres", "seller12345", "seller").await?;
    let user_id = ensure_user(&pool, "user@example.com", "Casey", "user12345", "user").await?;

    let produce = ensure_category(&pool, "Produce", "Fresh fruit and vegetables").await?;
    ensure_category(&pool, "Dairy", "Milk, cheese and eggs").await?;
    let farm_id = ensure_farm(&pool, seller_id, produce).await?;
    seed_products(&pool, farm_id, produce).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, Seller ID: {seller_id}, User ID: {user_id}, Farm ID: {farm_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    name: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(name)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_category(pool: &sqlx::PgPool, name: &str, description: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name, description)
        VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(description)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn ensure_farm(pool: &sqlx::PgPool, seller_id: Uuid, category_id: Uuid) -> anyhow::Result<Uuid> {
    let (farm_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO farms (id, seller_id, category_id, name, description, city, state, status)
        VALUES ($1, $2, $3, 'Sunny Acres', 'Family farm growing seasonal vegetables', 'Fresno', 'CA', 'approved')
        ON CONFLICT (seller_id) DO UPDATE SET status = 'approved'
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(seller_id)
    .bind(category_id)
    .fetch_one(pool)
    .await?;

    sqlx::query("UPDATE users SET farm_id = $1 WHERE id = $2")
        .bind(farm_id)
        .bind(seller_id)
        .execute(pool)
        .await?;

    println!("Ensured approved farm {farm_id}");
    Ok(farm_id)
}

async fn seed_products(pool: &sqlx::PgPool, farm_id: Uuid, category_id: Uuid) -> anyhow::Result<()> {
    let products = vec![
        ("Heirloom Tomatoes", "Vine-ripened, mixed colors", 450, 80, "lb"),
        ("Free Range Eggs", "One dozen brown eggs", 699, 40, "dozen"),
        ("Sweet Corn", "Picked this morning", 125, 200, "piece"),
        ("Honey", "Raw wildflower honey", 1200, 25, "jar"),
    ];

    for (title, desc, price, stock, unit) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, farm_id, category_id, title, description, price, stock, unit, status)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8, 'active'
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE farm_id = $2 AND title = $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(farm_id)
        .bind(category_id)
        .bind(title)
        .bind(desc)
        .bind(price as i64)
        .bind(stock as i32)
        .bind(unit)
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
