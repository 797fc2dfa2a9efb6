const STORE_URL: &str = "SUPABASE_URL";

const STORE_KEY: &str = "SUPABASE_KEY";

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub fn get_store_url() -> Option<String> {
    non_empty_var(STORE_URL)
}

pub fn get_store_key() -> Option<String> {
    non_empty_var(STORE_KEY)
}
