//! Product maintenance commands.

use clap::Subcommand;
use futures::stream::{self, StreamExt};
use reqwest::StatusCode;

use crate::App;

/// Sub-commands available under `products`.
#[derive(Debug, Subcommand)]
pub enum ProductsCommands {
    /// HEAD-check every stored product image URL
    VerifyImages {
        /// Concurrent requests
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
    },
}

/// Verify image URLs currently stored in the catalog.
///
/// Checks the default image and every active color variant image of every
/// active product. Logs non-200 URLs for cleanup and prints aggregate totals.
pub(crate) async fn run_verify_images(app: &App, concurrency: usize) -> anyhow::Result<()> {
    let products = app.catalog.list_all().await?;

    let mut targets: Vec<(String, String)> = Vec::new();
    for product in products.iter().filter(|product| product.active) {
        if let Some(url) = &product.default_image {
            targets.push((product.name.clone(), url.clone()));
        }
        for variant in product.color_variants.iter().filter(|variant| variant.active) {
            if let Some(url) = &variant.image {
                targets.push((
                    format!("{} / {}", product.name, variant.color_name),
                    url.clone(),
                ));
            }
        }
    }

    if targets.is_empty() {
        println!("no image URLs found to verify");
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(12))
        .user_agent("grifo-verifier/1.0")
        .build()?;

    let checks = stream::iter(targets.into_iter().map(|(label, url)| {
        let client = client.clone();
        async move {
            let result = client.head(&url).send().await;
            (label, url, result)
        }
    }))
    .buffer_unordered(concurrency.max(1))
    .collect::<Vec<_>>()
    .await;

    let mut ok_count = 0usize;
    let mut bad_count = 0usize;
    for (label, url, result) in checks {
        match result {
            Ok(resp) if resp.status() == StatusCode::OK => {
                ok_count += 1;
            }
            Ok(resp) => {
                bad_count += 1;
                tracing::warn!(
                    label = %label,
                    status = resp.status().as_u16(),
                    url = %url,
                    "image URL verification failed"
                );
            }
            Err(e) => {
                bad_count += 1;
                tracing::warn!(
                    label = %label,
                    error = %e,
                    url = %url,
                    "image URL verification failed"
                );
            }
        }
    }

    println!("verified image URLs: {ok_count} OK, {bad_count} bad");
    Ok(())
}
