use futures::{Stream, TryStreamExt as _, stream};

use super::{Error, Record, RecordResponse};

struct Paginator<Fetch> {
    fetch: Fetch,
    next_offset: Option<u32>,
    page_size: u32,
    yielded: u64,
    limit: Option<u64>,
}

/// Repeatedly fetch pages of records, starting at the 1-based `offset`, by
/// calling `fetch_page(offset, limit)`.
///
/// Paging stops after a page shorter than requested, once a page reaches the
/// end of the found set, or once `limit` records have been yielded. An error is
/// yielded once, and ends the stream.
pub fn paginate<'a, F, P, Fetch, Fut>(
    offset: u32,
    page_size: u32,
    limit: Option<u64>,
    fetch_page: Fetch,
) -> impl Stream<Item = Result<Record<F, P>, Error>> + 'a
where
    Fetch: FnMut(u32, u32) -> Fut + 'a,
    Fut: Future<Output = Result<RecordResponse<F, P>, Error>> + 'a,
    F: 'a,
    P: 'a,
{
    let state = Paginator {
        fetch: fetch_page,
        next_offset: Some(offset.max(1)),
        page_size: page_size.max(1),
        yielded: 0,
        limit,
    };

    stream::try_unfold(state, |mut state| async move {
        let Some(offset) = state.next_offset.take() else {
            return Ok(None);
        };

        let mut want = state.page_size;
        if let Some(limit) = state.limit {
            let remaining = limit.saturating_sub(state.yielded);
            if remaining == 0 {
                return Ok(None);
            }

            want = want.min(u32::try_from(remaining).unwrap_or(u32::MAX));
        }

        let RecordResponse {
            mut data,
            data_info,
            ..
        } = (state.fetch)(offset, want).await?;

        data.truncate(want as usize);
        let returned = data.len() as u64;
        state.yielded += returned;

        // Offsets are 1-based, so this page ends at `offset - 1 + returned`.
        let seen = u64::from(offset) - 1 + returned;
        let exhausted = returned < u64::from(want) || seen >= data_info.found_count;
        if !exhausted {
            state.next_offset = offset.checked_add(returned as u32);
        }

        let page = stream::iter(data.into_iter().map(Ok::<_, Error>));
        Ok::<_, Error>(Some((page, state)))
    })
    .try_flatten()
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use futures::StreamExt as _;

    use super::*;
    use crate::DataInfo;

    fn page(start: u64, len: u64, found: u64) -> RecordResponse<u64> {
        RecordResponse {
            data: (start..start + len)
                .map(|id| Record {
                    field_data: id,
                    portal_data: None,
                    record_id: id,
                    mod_id: 0,
                    portal_data_info: None,
                })
                .collect(),
            data_info: DataInfo {
                database: "db".into(),
                layout: "l".into(),
                table: "t".into(),
                total_record_count: found,
                found_count: found,
                returned_count: len,
            },
            script: None,
        }
    }

    /// Serves `found` records with ids 1..=found, and records each request.
    fn server(
        found: u64,
        calls: Arc<Mutex<Vec<(u32, u32)>>>,
    ) -> impl FnMut(u32, u32) -> futures::future::Ready<Result<RecordResponse<u64>, Error>> {
        move |offset, limit| {
            calls.lock().unwrap().push((offset, limit));
            let start = u64::from(offset);
            let len = (found + 1).saturating_sub(start).min(u64::from(limit));
            futures::future::ready(Ok(page(start, len, found)))
        }
    }

    #[tokio::test]
    async fn pages_until_short_page() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let ids: Vec<u64> = paginate(1, 2, None, server(5, calls.clone()))
            .map(|r| r.unwrap().record_id)
            .collect()
            .await;

        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(*calls.lock().unwrap(), vec![(1, 2), (3, 2), (5, 2)]);
    }

    #[tokio::test]
    async fn stops_at_found_count() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let ids: Vec<u64> = paginate(1, 2, None, server(4, calls.clone()))
            .map(|r| r.unwrap().record_id)
            .collect()
            .await;

        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn respects_limit() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let ids: Vec<u64> = paginate(2, 3, Some(4), server(100, calls.clone()))
            .map(|r| r.unwrap().record_id)
            .collect()
            .await;

        assert_eq!(ids, vec![2, 3, 4, 5]);
        assert_eq!(*calls.lock().unwrap(), vec![(2, 3), (5, 1)]);
    }

    #[tokio::test]
    async fn later_start_stops_at_found_count() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let fetch = move |offset: u32, limit: u32| {
            recorded.lock().unwrap().push((offset, limit));
            let result = if offset > 4 {
                Err(Error::Response("offset past found set"))
            } else {
                let len = (5 - u64::from(offset)).min(u64::from(limit));
                Ok(page(u64::from(offset), len, 4))
            };
            futures::future::ready(result)
        };

        let results: Vec<_> = paginate(3, 2, None, fetch).collect().await;
        let ids: Vec<u64> = results
            .into_iter()
            .map(|r| r.unwrap().record_id)
            .collect();

        assert_eq!(ids, vec![3, 4]);
        assert_eq!(*calls.lock().unwrap(), vec![(3, 2)]);
    }

    #[tokio::test]
    async fn error_ends_stream() {
        let mut n = 0;
        let fetch = move |offset: u32, _limit: u32| {
            n += 1;
            let result = if n == 1 {
                Ok(page(u64::from(offset), 2, 10))
            } else {
                Err(Error::NotConnected)
            };
            futures::future::ready(result)
        };

        let results: Vec<_> = paginate(1, 2, None, fetch).collect().await;
        assert_eq!(results.len(), 3);
        assert_matches!(results[2], Err(Error::NotConnected));
    }
}
