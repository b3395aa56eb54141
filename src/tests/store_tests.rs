//! tests/store_tests.rs
//! Bordes numéricos del TaskStore.

#[cfg(test)]
mod tests {
    use actix_rt::test;

    use crate::tests::support::{new_task, Harness};

    #[test]
    async fn test_huge_page_returns_empty_list() {
        let h = Harness::new().await;
        let task_id = h.store.create_task(&new_task(vec![1, 2])).await.unwrap();

        let page = h.store.list_events(&task_id, u64::MAX, 500).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.page, u64::MAX);

        let page = h.store.list_events(&task_id, 1, u64::MAX).await.unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    async fn test_out_of_range_delays_saturate() {
        let h = Harness::new().await;
        let mut input = new_task(vec![1]);
        input.delay_ms = u64::MAX;
        input.retry_delay_ms = u64::MAX;

        let task_id = h.store.create_task(&input).await.unwrap();
        let task = h.store.get_task(&task_id).await.unwrap().unwrap();
        assert_eq!(task.delay_ms, i64::MAX as u64);
        assert_eq!(task.retry_delay_ms, i64::MAX as u64);
    }
}
