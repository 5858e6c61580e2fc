use ethers::prelude::*;

abigen!(
    SwapRouter,
    r#"[
        struct ExactInputSingleParams { address tokenIn; address tokenOut; uint24 fee; address recipient; uint256 deadline; uint256 amountIn; uint256 amountOutMinimum; uint160 sqrtPriceLimitX96; }
        struct ExactInputParams { bytes path; address recipient; uint256 deadline; uint256 amountIn; uint256 amountOutMinimum; }
        function exactInputSingle(ExactInputSingleParams params) external payable returns (uint256 amountOut)
        function exactInput(ExactInputParams params) external payable returns (uint256 amountOut)
        function multicall(uint256 deadline, bytes[] data) external payable returns (bytes[] results)
        function wrapNative(uint256 value) external payable
        function unwrapNative(uint256 amountMinimum, address recipient) external payable
        function refundNative() external payable
    ]"#
);
