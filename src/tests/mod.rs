mod page_guard_test;
mod pool_variants_test;
