mod listing_import;
mod price_import;
