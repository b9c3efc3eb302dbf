//! 대상 사이트 특성 상수들
//!
//! 거래 테이블 페이지의 DOM 구조와 페이지네이션 파라미터를 정의합니다.

/// 대상 사이트 특성 상수들
pub mod site {
    /// 기본 시작 URL
    pub const ROOT_URL: &str = "https://web.bankin.com/challenge/index.html";

    /// 페이지네이션 오프셋 쿼리 파라미터 (`?start=<index>`)
    pub const START_PARAM: &str = "start";

    /// 테이블이 iframe 안에 렌더링되는 경우의 selector
    pub const FRAME_SELECTOR: &str = "iframe#fm";

    /// 테이블이 본문에 직접 렌더링되는 경우의 컨테이너 id
    pub const TABLE_CONTAINER_ID: &str = "dvTable";

    /// 데이터 로딩을 트리거하는 버튼 selector
    pub const GENERATE_BUTTON_SELECTOR: &str = "#btnGenerate";
}

/// 페이지네이션 복구 기본값들
pub mod recovery {
    /// 인덱스 하나당 최대 시도 횟수
    pub const MAX_NB_TRY: u32 = 5;

    /// backstep 전략의 최대 후퇴 횟수
    pub const MAX_BACK_STEP: u32 = 5;

    /// skip-list 전략에서 건너뛸 때의 stride (페이지당 최대 거래 수)
    pub const INDEX_STEP: i64 = 50;

    /// 전체 세션의 실패 허용 한도
    pub const MAX_TOTAL_RETRIES: u32 = 1000;
}
